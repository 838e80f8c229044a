//! Consensus engine
//!
//! [`Consensus`] is the thread-safe handle to a block DAG. Block processing
//! and conflict resolution take the write lock on the single [`DagContext`];
//! queries take the read lock. Events are delivered to subscribers in commit
//! order, and finalization of the past of a new finality point runs after the
//! lock is released.

pub mod clock;
pub mod context;
pub mod dag;
pub mod difficulty;
pub mod ghostdag;
pub mod notify;
pub mod storage;
pub mod types;
pub mod validation;

use crate::errors::{ConsensusError, ConsensusResult};
use crate::process::mining::MinerData;
use clock::{Clock, SystemClock};
use consensus_core::block::Block;
use consensus_core::config::Params;
use consensus_core::script::{ScriptVerifier, StandardScriptVerifier};
use consensus_core::tx::{Transaction, TransactionOutpoint, UtxoEntry};
use consensus_core::utxo::UtxoView;
use consensus_core::Hash;
use context::DagContext;
use dag::index::NodeId;
use database::Database;
use notify::{ConsensusEvent, Notifier};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use storage::ConsensusStorage;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::error;
use types::{BehaviorFlags, BlockInfo, BlockStatus, ConsensusConfig, FinalityConflict, ProcessResult};

pub use context::{SelectedChain, VirtualState};

#[derive(Clone)]
pub struct Consensus {
    inner: Arc<RwLock<DagContext>>,
    notifier: Arc<Notifier>,
}

impl Consensus {
    /// In-memory consensus with the system clock and the standard script verifier
    pub fn new(config: ConsensusConfig) -> ConsensusResult<Self> {
        Self::with_parts(config, ConsensusStorage::in_memory(), Arc::new(SystemClock), Arc::new(StandardScriptVerifier))
    }

    /// Opens (or creates) a database-backed consensus at `path`
    pub fn open(path: impl AsRef<Path>, config: ConsensusConfig) -> ConsensusResult<Self> {
        let db = Arc::new(Database::open(path)?);
        let storage = ConsensusStorage::with_db(db, &config);
        Self::with_parts(config, storage, Arc::new(SystemClock), Arc::new(StandardScriptVerifier))
    }

    pub fn with_parts(
        config: ConsensusConfig,
        storage: ConsensusStorage,
        clock: Arc<dyn Clock>,
        verifier: Arc<dyn ScriptVerifier>,
    ) -> ConsensusResult<Self> {
        let ctx = DagContext::new(config, storage, verifier, clock)?;
        Ok(Self { inner: Arc::new(RwLock::new(ctx)), notifier: Arc::new(Notifier::new()) })
    }

    pub fn process_block(&self, block: Block) -> ConsensusResult<ProcessResult> {
        self.process_block_with_flags(block, BehaviorFlags::default())
    }

    pub fn process_block_with_flags(&self, block: Block, flags: BehaviorFlags) -> ConsensusResult<ProcessResult> {
        self.with_write(|ctx| ctx.process_block(block, flags))
    }

    /// Processes delayed blocks that became due; returns the accepted ones
    pub fn tick(&self) -> ConsensusResult<Vec<Hash>> {
        self.with_write(|ctx| ctx.tick())
    }

    /// Settles an open finality conflict. `valid` and `invalid` name blocks
    /// on the two branches that fork below the conflicting tips.
    pub fn resolve_finality_conflict(&self, id: u64, valid: &[Hash], invalid: &[Hash]) -> ConsensusResult<()> {
        self.with_write(|ctx| ctx.resolve_finality_conflict(id, valid, invalid))
    }

    /// Builds a block on `parents` (the virtual's parents if `None`)
    pub fn build_block(
        &self,
        parents: Option<Vec<Hash>>,
        miner: &MinerData,
        transactions: Vec<Transaction>,
        timestamp: Option<i64>,
    ) -> ConsensusResult<Block> {
        self.inner.read().build_block(parents, miner, transactions, timestamp)
    }

    pub fn subscribe(&self) -> UnboundedReceiver<ConsensusEvent> {
        self.notifier.subscribe()
    }

    fn with_write<T>(&self, f: impl FnOnce(&mut DagContext) -> ConsensusResult<T>) -> ConsensusResult<T> {
        let mut ctx = self.inner.write();
        let result = f(&mut ctx);
        self.notifier.notify(ctx.take_events());
        let finality_point = ctx.pending_finalization.take();
        drop(ctx);
        if let Some(finality_point) = finality_point {
            self.spawn_finalization(finality_point);
        }
        result
    }

    fn spawn_finalization(&self, finality_point: NodeId) {
        let inner = self.inner.clone();
        let finalize = move || {
            if let Err(err) = inner.write().finalize_past(finality_point) {
                error!(%err, "finalizing the past of the finality point failed");
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(finalize);
            }
            Err(_) => finalize(),
        }
    }

    pub fn genesis_hash(&self) -> Hash {
        let ctx = self.inner.read();
        ctx.index.hash(ctx.genesis)
    }

    pub fn params(&self) -> Params {
        self.inner.read().params().clone()
    }

    pub fn block_status(&self, hash: &Hash) -> Option<BlockStatus> {
        let ctx = self.inner.read();
        ctx.index.lookup(hash).map(|id| ctx.index.status(id))
    }

    pub fn block_info(&self, hash: &Hash) -> Option<BlockInfo> {
        let ctx = self.inner.read();
        let id = ctx.index.lookup(hash)?;
        let node = ctx.index.node(id);
        Some(BlockInfo {
            hash: *hash,
            status: node.status,
            blue_score: node.blue_score(),
            selected_parent: node.selected_parent().map(|sp| ctx.index.hash(sp)),
            blues: ctx.index.hashes(node.ghostdag.mergeset_blues.iter().copied()),
            reds: ctx.index.hashes(node.ghostdag.mergeset_reds.iter().copied()),
            parents: ctx.index.hashes(node.parents.iter().copied()),
            children: ctx.index.hashes(node.children.iter().copied()),
            is_finalized: node.is_finalized,
            timestamp: node.timestamp(),
        })
    }

    /// Body of a block in the DAG
    pub fn get_block(&self, hash: &Hash) -> ConsensusResult<Option<Arc<Block>>> {
        let ctx = self.inner.read();
        if !ctx.index.contains(hash) {
            return Ok(None);
        }
        Ok(Some(ctx.storage.blocks.get(hash)?))
    }

    pub fn is_in_dag(&self, hash: &Hash) -> bool {
        self.inner.read().index.contains(hash)
    }

    /// In the DAG, the orphan pool or the delayed queue
    pub fn is_known_block(&self, hash: &Hash) -> bool {
        self.inner.read().is_known_block(hash)
    }

    /// Whether `ancestor` is in the past of `descendant` (a block is in its own past)
    pub fn is_in_past(&self, ancestor: &Hash, descendant: &Hash) -> ConsensusResult<bool> {
        let ctx = self.inner.read();
        let a = ctx.index.get(ancestor)?;
        let d = ctx.index.get(descendant)?;
        ctx.reachability.is_dag_ancestor_of(a, d)
    }

    pub fn tips(&self) -> Vec<Hash> {
        self.inner.read().tip_hashes()
    }

    pub fn valid_tips(&self) -> Vec<Hash> {
        self.inner.read().valid_tip_hashes()
    }

    pub fn virtual_blue_score(&self) -> u64 {
        self.inner.read().virtual_state.ghostdag.blue_score
    }

    /// Selected parent first
    pub fn virtual_parents(&self) -> Vec<Hash> {
        let ctx = self.inner.read();
        ctx.index.hashes(ctx.virtual_state.parents.iter().copied())
    }

    pub fn selected_tip(&self) -> Hash {
        let ctx = self.inner.read();
        ctx.index.hash(ctx.selected_tip())
    }

    /// Selected chain from genesis up to the selected tip
    pub fn selected_parent_chain(&self) -> Vec<Hash> {
        let ctx = self.inner.read();
        ctx.index.hashes(ctx.selected_chain.blocks().iter().copied())
    }

    pub fn last_finality_point(&self) -> Hash {
        let ctx = self.inner.read();
        ctx.index.hash(ctx.last_finality_point)
    }

    pub fn finality_conflicts(&self) -> Vec<FinalityConflict> {
        self.inner.read().finality_conflicts.clone()
    }

    /// Entry in the virtual's UTXO set
    pub fn get_utxo_entry(&self, outpoint: &TransactionOutpoint) -> ConsensusResult<Option<UtxoEntry>> {
        Ok(self.inner.read().storage.utxo_set.get(outpoint)?)
    }

    /// Entry in the UTXO set of a UTXO-verified block
    pub fn restore_past_utxo_entry(&self, block: &Hash, outpoint: &TransactionOutpoint) -> ConsensusResult<Option<UtxoEntry>> {
        let ctx = self.inner.read();
        let id = ctx.index.get(block)?;
        if !ctx.index.status(id).is_valid() {
            return Err(ConsensusError::NotUtxoVerified(*block));
        }
        ctx.restore_past_utxo_entry(id, outpoint)
    }

    #[cfg(test)]
    pub(crate) fn read_context<T>(&self, f: impl FnOnce(&DagContext) -> T) -> T {
        f(&self.inner.read())
    }

    pub fn orphan_count(&self) -> usize {
        self.inner.read().orphans.len()
    }

    pub fn delayed_count(&self) -> usize {
        self.inner.read().delayed.len()
    }
}
