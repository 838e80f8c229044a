use serde::{Deserialize, Serialize};

use crate::tx::TransactionId;
use crate::Hash;

/// Outcome of one transaction of a merged block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxAcceptanceData {
    pub tx_index: u32,
    pub tx_id: TransactionId,
    pub is_accepted: bool,
    /// Fee paid if accepted, zero otherwise
    pub fee: u64,
}

/// Acceptance of every transaction of one blue block of a merge set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockAcceptanceData {
    pub block_hash: Hash,
    pub tx_entries: Vec<TxAcceptanceData>,
}

impl BlockAcceptanceData {
    /// Sum of fees of the accepted non-coinbase transactions
    pub fn total_fees(&self) -> u64 {
        self.tx_entries.iter().filter(|e| e.is_accepted).fold(0u64, |acc, e| acc.saturating_add(e.fee))
    }

    pub fn accepted_ids(&self) -> impl Iterator<Item = TransactionId> + '_ {
        self.tx_entries.iter().filter(|e| e.is_accepted).map(|e| e.tx_id)
    }
}

/// Acceptance data of a whole merge set, blues in GHOSTDAG order (selected parent first)
pub type MergeSetAcceptanceData = Vec<BlockAcceptanceData>;
