use crate::errors::ConsensusResult;
use consensus_core::Hash;
use database::stores::HashKeyedStore;
use database::{Database, DbBatch, DbResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Write-back cache over a hash-keyed column family.
///
/// Writes stay in memory and are tracked as dirty until staged into a commit
/// batch. Without a database the cache is the store itself and never evicts.
pub struct CachedStore<T> {
    db: Option<HashKeyedStore<T>>,
    entries: HashMap<Hash, T>,
    dirty: HashSet<Hash>,
    deleted: HashSet<Hash>,
}

impl<T: Clone + Serialize + DeserializeOwned> CachedStore<T> {
    pub fn in_memory() -> Self {
        Self { db: None, entries: HashMap::new(), dirty: HashSet::new(), deleted: HashSet::new() }
    }

    pub fn with_db(db: Arc<Database>, cf: &'static str) -> Self {
        Self { db: Some(HashKeyedStore::new(db, cf)), ..Self::in_memory() }
    }

    pub fn get(&self, hash: &Hash) -> ConsensusResult<Option<Cow<'_, T>>> {
        if let Some(value) = self.entries.get(hash) {
            return Ok(Some(Cow::Borrowed(value)));
        }
        if self.deleted.contains(hash) {
            return Ok(None);
        }
        match &self.db {
            Some(store) => Ok(store.get(hash)?.map(Cow::Owned)),
            None => Ok(None),
        }
    }

    pub fn contains(&self, hash: &Hash) -> ConsensusResult<bool> {
        Ok(self.get(hash)?.is_some())
    }

    pub fn insert(&mut self, hash: Hash, value: T) {
        self.deleted.remove(&hash);
        self.dirty.insert(hash);
        self.entries.insert(hash, value);
    }

    pub fn delete(&mut self, hash: &Hash) {
        self.entries.remove(hash);
        self.dirty.remove(hash);
        if self.db.is_some() {
            self.deleted.insert(*hash);
        }
    }

    /// Drops a committed entry from memory. Returns false if the entry is
    /// pending a write or there is no database to re-read it from.
    pub fn evict(&mut self, hash: &Hash) -> bool {
        if self.db.is_none() || self.dirty.contains(hash) {
            return false;
        }
        self.entries.remove(hash).is_some()
    }

    pub fn cached_len(&self) -> usize {
        self.entries.len()
    }

    pub fn cached_keys(&self) -> impl Iterator<Item = &Hash> {
        self.entries.keys()
    }

    pub fn stage(&self, batch: &mut DbBatch) -> DbResult<()> {
        let Some(store) = &self.db else { return Ok(()) };
        for hash in &self.dirty {
            if let Some(value) = self.entries.get(hash) {
                store.put(batch, hash, value)?;
            }
        }
        for hash in &self.deleted {
            store.delete(batch, hash)?;
        }
        Ok(())
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
        self.deleted.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::db::CF_MULTISETS;
    use tempfile::TempDir;

    fn h(n: u64) -> Hash {
        Hash::from_le_u64([n, 0, 0, 0])
    }

    #[test]
    fn test_memory_store_never_evicts() {
        let mut store = CachedStore::in_memory();
        store.insert(h(1), vec![1u8]);
        store.clear_dirty();
        assert!(!store.evict(&h(1)));
        assert_eq!(store.get(&h(1)).unwrap().as_deref(), Some(&vec![1u8]));
        store.delete(&h(1));
        assert!(!store.contains(&h(1)).unwrap());
    }

    #[test]
    fn test_evicted_entries_are_reread_from_db() {
        let tmp = TempDir::new().unwrap();
        let db = Arc::new(Database::open(tmp.path()).unwrap());
        let mut store = CachedStore::with_db(db.clone(), CF_MULTISETS);
        store.insert(h(1), vec![7u8]);
        // Dirty entries stay in memory
        assert!(!store.evict(&h(1)));

        let mut batch = db.batch();
        store.stage(&mut batch).unwrap();
        db.write_batch(batch).unwrap();
        store.clear_dirty();

        assert!(store.evict(&h(1)));
        assert_eq!(store.cached_len(), 0);
        assert!(matches!(store.get(&h(1)).unwrap(), Some(Cow::Owned(v)) if v == vec![7u8]));

        store.delete(&h(1));
        assert!(store.get(&h(1)).unwrap().is_none());
        let mut batch = db.batch();
        store.stage(&mut batch).unwrap();
        db.write_batch(batch).unwrap();
        store.clear_dirty();
        assert!(store.get(&h(1)).unwrap().is_none());
    }
}
