use crate::db::CF_UTXOS;
use crate::{Database, DbBatch, DbError, DbResult};
use consensus_core::tx::{TransactionOutpoint, UtxoEntry};
use consensus_core::Hash;
use std::sync::Arc;

/// The virtual's full UTXO set on disk
pub struct UtxoStore {
    db: Arc<Database>,
}

impl UtxoStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn get(&self, outpoint: &TransactionOutpoint) -> DbResult<Option<UtxoEntry>> {
        match self.db.get(CF_UTXOS, &Self::outpoint_to_key(outpoint))? {
            Some(data) => Ok(Some(bincode::deserialize(&data)?)),
            None => Ok(None),
        }
    }

    pub fn put(&self, batch: &mut DbBatch, outpoint: &TransactionOutpoint, entry: &UtxoEntry) -> DbResult<()> {
        batch.put(CF_UTXOS, &Self::outpoint_to_key(outpoint), &bincode::serialize(entry)?)
    }

    pub fn delete(&self, batch: &mut DbBatch, outpoint: &TransactionOutpoint) -> DbResult<()> {
        batch.delete(CF_UTXOS, &Self::outpoint_to_key(outpoint))
    }

    pub fn load_all(&self) -> DbResult<Vec<(TransactionOutpoint, UtxoEntry)>> {
        self.db
            .iterate_all(CF_UTXOS)?
            .into_iter()
            .map(|(key, value)| Ok((Self::key_to_outpoint(&key)?, bincode::deserialize(&value)?)))
            .collect()
    }

    fn outpoint_to_key(outpoint: &TransactionOutpoint) -> Vec<u8> {
        let mut key = outpoint.transaction_id.as_bytes().to_vec();
        key.extend_from_slice(&outpoint.index.to_le_bytes());
        key
    }

    fn key_to_outpoint(key: &[u8]) -> DbResult<TransactionOutpoint> {
        if key.len() != 36 {
            return Err(DbError::InvalidData(format!("utxo key of length {}", key.len())));
        }
        let txid = Hash::try_from_slice(&key[..32]).map_err(|e| DbError::InvalidData(e.to_string()))?;
        let mut index = [0u8; 4];
        index.copy_from_slice(&key[32..]);
        Ok(TransactionOutpoint::new(txid, u32::from_le_bytes(index)))
    }
}
