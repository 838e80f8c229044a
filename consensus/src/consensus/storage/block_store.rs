//! Block bodies
//!
//! Bodies are needed long after a block is accepted: its transactions are
//! accepted by every block that merges it. In database mode the most recently
//! used bodies stay in an LRU cache and the rest are read back from disk.

use crate::errors::{ConsensusError, ConsensusResult};
use consensus_core::block::Block;
use consensus_core::Hash;
use database::stores::BlockStore;
use database::{Database, DbBatch, DbResult};
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

pub enum BlockBodyStore {
    Memory(HashMap<Hash, Arc<Block>>),
    Stored { store: BlockStore, pending: HashMap<Hash, Arc<Block>>, cache: Mutex<LruCache<Hash, Arc<Block>>> },
}

impl BlockBodyStore {
    pub fn in_memory() -> Self {
        Self::Memory(HashMap::new())
    }

    pub fn with_db(db: Arc<Database>, cache_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self::Stored { store: BlockStore::new(db), pending: HashMap::new(), cache: Mutex::new(LruCache::new(capacity)) }
    }

    pub fn insert(&mut self, block: Arc<Block>) {
        match self {
            Self::Memory(blocks) => {
                blocks.insert(block.hash(), block);
            }
            Self::Stored { pending, .. } => {
                pending.insert(block.hash(), block);
            }
        }
    }

    pub fn get(&self, hash: &Hash) -> ConsensusResult<Arc<Block>> {
        match self {
            Self::Memory(blocks) => blocks.get(hash).cloned().ok_or_else(|| missing(hash)),
            Self::Stored { store, pending, cache } => {
                if let Some(block) = pending.get(hash) {
                    return Ok(block.clone());
                }
                if let Some(block) = cache.lock().get(hash) {
                    return Ok(block.clone());
                }
                let block = Arc::new(store.get_block(hash)?.ok_or_else(|| missing(hash))?);
                cache.lock().put(*hash, block.clone());
                Ok(block)
            }
        }
    }

    pub fn stage(&self, batch: &mut DbBatch) -> DbResult<()> {
        if let Self::Stored { store, pending, .. } = self {
            for block in pending.values() {
                store.put_block(batch, block)?;
            }
        }
        Ok(())
    }

    /// Moves committed bodies into the cache
    pub fn clear_pending(&mut self) {
        if let Self::Stored { pending, cache, .. } = self {
            let mut cache = cache.lock();
            for (hash, block) in pending.drain() {
                cache.put(hash, block);
            }
        }
    }
}

fn missing(hash: &Hash) -> ConsensusError {
    ConsensusError::invariant(format!("missing body of block {hash}"))
}
