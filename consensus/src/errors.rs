//! Crate-level error type
//!
//! Errors fall into three classes: rule violations (the block is bad, never
//! retried), transient faults (storage hiccups, the caller may retry) and
//! invariant violations (internal state is inconsistent, the node must stop).

use consensus_core::errors::RuleError;
use consensus_core::utxo::UtxoError;
use consensus_core::{Hash, KType};
use database::DbError;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error("storage error: {0}")]
    Store(#[from] DbError),

    #[error("transient error: {0}")]
    Transient(String),

    #[error("invariant violation: {0}")]
    Invariant(String),

    /// A blue's recorded blue anticone exceeds k: the stored coloring was
    /// produced under different parameters or is corrupt
    #[error("blue block {block} has a blue anticone of {size}, above k = {k}")]
    BlueAnticoneOverflow { block: Hash, size: KType, k: KType },

    #[error("unknown block {0}")]
    UnknownBlock(Hash),

    #[error("block {0} is not UTXO verified")]
    NotUtxoVerified(Hash),

    #[error("unknown finality conflict {0}")]
    UnknownFinalityConflict(u64),

    #[error("invalid finality conflict resolution: {0}")]
    InvalidConflictResolution(String),
}

impl ConsensusError {
    /// Builds an invariant violation and logs it; callers should treat it as fatal
    pub fn invariant(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        error!(%msg, "consensus invariant violated");
        ConsensusError::Invariant(msg)
    }

    pub fn is_rule_error(&self) -> bool {
        matches!(self, ConsensusError::Rule(_))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ConsensusError::Store(_) | ConsensusError::Transient(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ConsensusError::Invariant(_) | ConsensusError::BlueAnticoneOverflow { .. })
    }

    pub fn as_rule_error(&self) -> Option<&RuleError> {
        match self {
            ConsensusError::Rule(e) => Some(e),
            _ => None,
        }
    }
}

impl From<UtxoError> for ConsensusError {
    fn from(err: UtxoError) -> Self {
        match err {
            UtxoError::ContradictoryDiff(..) => ConsensusError::invariant(err.to_string()),
            UtxoError::Store(msg) => ConsensusError::Transient(msg),
        }
    }
}

pub type ConsensusResult<T> = std::result::Result<T, ConsensusError>;
