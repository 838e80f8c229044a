use crate::{Database, DbBatch, DbError, DbResult};
use consensus_core::Hash;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

/// Bincode-encoded records keyed by block hash in one column family
pub struct HashKeyedStore<T> {
    db: Arc<Database>,
    cf: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> HashKeyedStore<T> {
    pub fn new(db: Arc<Database>, cf: &'static str) -> Self {
        Self { db, cf, _marker: PhantomData }
    }

    pub fn get(&self, hash: &Hash) -> DbResult<Option<T>> {
        match self.db.get(self.cf, hash.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put(&self, batch: &mut DbBatch, hash: &Hash, value: &T) -> DbResult<()> {
        batch.put(self.cf, hash.as_bytes(), &bincode::serialize(value)?)
    }

    pub fn delete(&self, batch: &mut DbBatch, hash: &Hash) -> DbResult<()> {
        batch.delete(self.cf, hash.as_bytes())
    }

    pub fn load_all(&self) -> DbResult<Vec<(Hash, T)>> {
        self.db
            .iterate_all(self.cf)?
            .into_iter()
            .map(|(key, value)| {
                let hash = Hash::try_from_slice(&key).map_err(|_| DbError::InvalidData(format!("bad key length {} in {}", key.len(), self.cf)))?;
                Ok((hash, bincode::deserialize(&value)?))
            })
            .collect()
    }
}
