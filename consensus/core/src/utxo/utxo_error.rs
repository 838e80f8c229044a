use crate::tx::TransactionOutpoint;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UtxoError {
    /// Two diffs disagree about the state of an outpoint in their common base
    #[error("contradictory utxo diffs at {0}: {1}")]
    ContradictoryDiff(TransactionOutpoint, &'static str),

    /// The backing store of a view failed
    #[error("utxo store error: {0}")]
    Store(String),
}

pub type UtxoResult<T> = std::result::Result<T, UtxoError>;
