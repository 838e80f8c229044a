use crate::db::CF_BLOCK_INDEX;
use crate::{Database, DbBatch, DbError, DbResult};
use consensus_core::Hash;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

pub const BLOCK_INDEX_KEY_SIZE: usize = 40;

/// 8-byte big-endian blue score followed by the 32-byte hash, so iteration is blue-score ordered
pub fn block_index_key(blue_score: u64, hash: &Hash) -> [u8; BLOCK_INDEX_KEY_SIZE] {
    let mut key = [0u8; BLOCK_INDEX_KEY_SIZE];
    key[..8].copy_from_slice(&blue_score.to_be_bytes());
    key[8..].copy_from_slice(hash.as_bytes());
    key
}

/// Block nodes keyed by [`block_index_key`]
pub struct BlockIndexStore {
    db: Arc<Database>,
}

impl BlockIndexStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn put<T: Serialize>(&self, batch: &mut DbBatch, blue_score: u64, hash: &Hash, record: &T) -> DbResult<()> {
        batch.put(CF_BLOCK_INDEX, &block_index_key(blue_score, hash), &bincode::serialize(record)?)
    }

    /// Every record in ascending blue-score order
    pub fn load_all<T: DeserializeOwned>(&self) -> DbResult<Vec<(u64, Hash, T)>> {
        self.db
            .iterate_all(CF_BLOCK_INDEX)?
            .into_iter()
            .map(|(key, value)| {
                if key.len() != BLOCK_INDEX_KEY_SIZE {
                    return Err(DbError::InvalidData(format!("block index key of length {}", key.len())));
                }
                let mut score = [0u8; 8];
                score.copy_from_slice(&key[..8]);
                let hash = Hash::try_from_slice(&key[8..]).map_err(|e| DbError::InvalidData(e.to_string()))?;
                Ok((u64::from_be_bytes(score), hash, bincode::deserialize(&value)?))
            })
            .collect()
    }
}
