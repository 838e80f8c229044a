use crate::db::CF_METADATA;
use crate::{Database, DbBatch, DbResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Single-row records stored as JSON
pub struct MetadataStore {
    db: Arc<Database>,
}

impl MetadataStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn put_json<T: Serialize>(&self, batch: &mut DbBatch, key: &str, value: &T) -> DbResult<()> {
        batch.put(CF_METADATA, key.as_bytes(), &serde_json::to_vec(value)?)
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> DbResult<Option<T>> {
        match self.db.get(CF_METADATA, key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}
