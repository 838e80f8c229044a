//! Consensus engine of a GHOSTDAG block DAG
//!
//! Keeps the DAG of blocks, orders it with GHOSTDAG, validates blocks against
//! the UTXO set of their past, maintains the virtual block with the full UTXO
//! set, enforces finality, and persists everything to the database.

pub mod consensus;
pub mod errors;
pub mod pipeline;
pub mod process;

pub use consensus::clock::{Clock, MockClock, SystemClock};
pub use consensus::notify::{ConsensusEvent, Notifier};
pub use consensus::storage::ConsensusStorage;
pub use consensus::types::{BehaviorFlags, BlockInfo, BlockOutcome, BlockStatus, ConsensusConfig, FinalityConflict, ProcessResult};
pub use consensus::Consensus;
pub use consensus_core::Hash;
pub use errors::{ConsensusError, ConsensusResult};
pub use process::MinerData;
