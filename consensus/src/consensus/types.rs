//! Consensus-specific types
//!
//! Block statuses, engine configuration, per-call behavior flags and the
//! outcome of processing a block.

use consensus_core::config::Params;
use consensus_core::Hash;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a block in the DAG
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockStatus {
    /// Stored but the pipeline has not decided yet. Never observed after a commit.
    DataStored,
    /// A finality violator that does not beat the selected tip
    UTXOPendingVerification,
    /// Accepted into the DAG without UTXO verification
    UTXONotVerified,
    /// UTXO verification of the block or of its selected chain failed
    DisqualifiedFromChain,
    /// A finality violator that beats the selected tip, waiting for manual resolution
    ViolatedSubjectiveFinality,
    /// UTXO verified
    Valid,
    /// The block itself broke a consensus rule
    ValidateFailed,
    /// Some parent is invalid
    InvalidAncestor,
    /// Rejected by a finality conflict resolution
    ManuallyRejected,
}

impl BlockStatus {
    pub fn is_valid(self) -> bool {
        self == BlockStatus::Valid
    }

    /// Invalid blocks poison every descendant
    pub fn is_invalid(self) -> bool {
        matches!(self, BlockStatus::ValidateFailed | BlockStatus::InvalidAncestor | BlockStatus::ManuallyRejected)
    }

    /// Blocks that can never become the virtual's selected parent
    pub fn is_disqualified_from_chain(self) -> bool {
        self.is_invalid() || matches!(self, BlockStatus::DisqualifiedFromChain)
    }

    pub fn is_finality_violator(self) -> bool {
        matches!(self, BlockStatus::UTXOPendingVerification | BlockStatus::ViolatedSubjectiveFinality)
    }

    /// Accepted into the DAG but UTXO verification is still ahead
    pub fn is_pending_verification(self) -> bool {
        matches!(self, BlockStatus::DataStored | BlockStatus::UTXONotVerified | BlockStatus::UTXOPendingVerification)
    }
}

/// Engine configuration: consensus parameters plus local resource knobs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    pub params: Params,
    /// Byte ceiling of the in-memory UTXO cache (database-backed storage only)
    pub utxo_cache_max_bytes: usize,
    /// UTXO diffs of blocks further than this many blue-score units behind the
    /// selected tip are dropped from memory and re-read on demand
    pub utxo_diff_eviction_window: u64,
    pub orphan_pool_capacity: usize,
    /// Number of block bodies kept in memory (database-backed storage only)
    pub block_body_cache_capacity: usize,
    /// Delete UTXO diffs of finalized blocks instead of only evicting them from memory
    pub prune_finalized_diffs: bool,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self::new(Params::default())
    }
}

impl ConsensusConfig {
    pub fn new(params: Params) -> Self {
        Self {
            params,
            utxo_cache_max_bytes: 256 * 1024 * 1024,
            utxo_diff_eviction_window: 1000,
            orphan_pool_capacity: 100,
            block_body_cache_capacity: 2048,
            prune_finalized_diffs: false,
        }
    }
}

/// Per-call switches of [`crate::Consensus::process_block`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BehaviorFlags {
    /// Fail with `OrphanBlockNotAllowed` instead of queueing an orphan
    pub disallow_orphans: bool,
    /// Fail with `DelayedBlockNotAllowed` instead of queueing a delayed block
    pub disallow_delay: bool,
    /// The block comes out of the delayed queue; skip the delay check
    pub after_delay: bool,
    /// The block comes out of the orphan pool
    pub was_unorphaned: bool,
}

/// Three-valued outcome of processing a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// Inserted into the DAG with the given status
    Accepted(BlockStatus),
    /// Parked until its parents arrive
    Orphan,
    /// Parked until its timestamp is near enough
    Delayed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    pub hash: Hash,
    pub outcome: BlockOutcome,
    /// Orphans and delayed blocks that got accepted as a consequence of this call
    pub released: Vec<Hash>,
}

impl ProcessResult {
    pub fn new(hash: Hash, outcome: BlockOutcome) -> Self {
        Self { hash, outcome, released: Vec::new() }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self.outcome, BlockOutcome::Accepted(_))
    }

    pub fn is_orphan(&self) -> bool {
        self.outcome == BlockOutcome::Orphan
    }

    pub fn is_delayed(&self) -> bool {
        self.outcome == BlockOutcome::Delayed
    }
}

/// A finality violator that beat the selected tip, and its resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FinalityConflict {
    pub id: u64,
    pub conflict_time: i64,
    pub current_selected_tip_hash: Hash,
    pub violating_block_hash: Hash,
    pub resolution_time: Option<i64>,
}

impl FinalityConflict {
    pub fn is_open(&self) -> bool {
        self.resolution_time.is_none()
    }
}

/// Read-only snapshot of a block node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    pub hash: Hash,
    pub status: BlockStatus,
    pub blue_score: u64,
    pub selected_parent: Option<Hash>,
    pub blues: Vec<Hash>,
    pub reds: Vec<Hash>,
    pub parents: Vec<Hash>,
    pub children: Vec<Hash>,
    pub is_finalized: bool,
    pub timestamp: i64,
}
