use crate::db::CF_BLOCKS;
use crate::{Database, DbBatch, DbError, DbResult};
use consensus_core::block::Block;
use consensus_core::Hash;
use std::sync::Arc;

/// Raw blocks in their wire encoding
pub struct BlockStore {
    db: Arc<Database>,
}

impl BlockStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn put_block(&self, batch: &mut DbBatch, block: &Block) -> DbResult<()> {
        batch.put(CF_BLOCKS, block.hash().as_bytes(), &block.to_bytes())
    }

    pub fn get_block(&self, hash: &Hash) -> DbResult<Option<Block>> {
        match self.db.get(CF_BLOCKS, hash.as_bytes())? {
            Some(bytes) => {
                let block = Block::from_bytes(&bytes).map_err(|e| DbError::InvalidData(format!("block {hash}: {e}")))?;
                Ok(Some(block))
            }
            None => Ok(None),
        }
    }

    pub fn has_block(&self, hash: &Hash) -> DbResult<bool> {
        self.db.exists(CF_BLOCKS, hash.as_bytes())
    }
}
