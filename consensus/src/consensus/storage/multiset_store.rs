use super::cached_store::CachedStore;
use crate::errors::{ConsensusError, ConsensusResult};
use consensus_core::Hash;
use database::db::CF_MULTISETS;
use database::{Database, DbBatch, DbResult};
use jio_muhash::Multiset;
use std::sync::Arc;

/// Multiset of the UTXO set of every UTXO-verified block
pub struct MultisetStore {
    multisets: CachedStore<Vec<u8>>,
}

impl MultisetStore {
    pub fn in_memory() -> Self {
        Self { multisets: CachedStore::in_memory() }
    }

    pub fn with_db(db: Arc<Database>) -> Self {
        Self { multisets: CachedStore::with_db(db, CF_MULTISETS) }
    }

    pub fn get(&self, hash: &Hash) -> ConsensusResult<Multiset> {
        let bytes = self.multisets.get(hash)?.ok_or_else(|| ConsensusError::invariant(format!("missing multiset of block {hash}")))?;
        Multiset::from_bytes(&bytes).map_err(|e| ConsensusError::invariant(format!("multiset of block {hash}: {e}")))
    }

    pub fn insert(&mut self, hash: Hash, multiset: &Multiset) {
        self.multisets.insert(hash, multiset.to_bytes());
    }

    pub fn stage(&self, batch: &mut DbBatch) -> DbResult<()> {
        self.multisets.stage(batch)
    }

    pub fn clear_dirty(&mut self) {
        self.multisets.clear_dirty();
    }
}
