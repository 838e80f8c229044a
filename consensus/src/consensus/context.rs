//! The DAG context
//!
//! Owns every piece of mutable consensus state: the block index, reachability,
//! tips, the virtual block, the selected chain, finality bookkeeping, the
//! orphan and delayed queues and the stores. All of it lives behind one
//! reader/writer lock held by [`crate::Consensus`]; the processing stages are
//! `impl DagContext` blocks spread over the `pipeline` and `process` modules.

use crate::consensus::clock::Clock;
use crate::consensus::dag::index::{BlockIndex, BlockNode, NodeId};
use crate::consensus::dag::reachability::ReachabilityTree;
use crate::consensus::difficulty::DifficultyManager;
use crate::consensus::ghostdag::{GhostdagData, GhostdagManager};
use crate::consensus::notify::ConsensusEvent;
use crate::consensus::storage::{ConsensusStorage, DagState};
use crate::consensus::types::{BlockStatus, ConsensusConfig, FinalityConflict};
use crate::consensus::validation::{BlockValidator, HeaderValidator, TransactionValidator};
use crate::errors::{ConsensusError, ConsensusResult};
use crate::pipeline::deps_manager::OrphanPool;
use crate::pipeline::flow::process_queue::DelayedBlocks;
use consensus_core::acceptance_data::MergeSetAcceptanceData;
use consensus_core::config::genesis::build_genesis;
use consensus_core::config::params::Params;
use consensus_core::script::ScriptVerifier;
use consensus_core::utxo::UtxoDiff;
use consensus_core::Hash;
use jio_muhash::Multiset;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;

/// The virtual block: merges every selectable tip
#[derive(Clone, Debug)]
pub struct VirtualState {
    pub selected_parent: NodeId,
    /// Selected parent first
    pub parents: Vec<NodeId>,
    pub ghostdag: GhostdagData,
}

/// Chain of selected parents from genesis up to the virtual's selected parent
#[derive(Clone, Debug, Default)]
pub struct SelectedChain {
    blocks: Vec<NodeId>,
    positions: HashMap<NodeId, usize>,
}

impl SelectedChain {
    pub fn new(genesis: NodeId) -> Self {
        Self { blocks: vec![genesis], positions: HashMap::from([(genesis, 0)]) }
    }

    /// Rebuilds the chain by walking selected parents down from `tip`
    pub fn from_tip(tip: NodeId, index: &BlockIndex) -> Self {
        let mut blocks = vec![tip];
        let mut current = tip;
        while let Some(sp) = index.node(current).selected_parent() {
            blocks.push(sp);
            current = sp;
        }
        blocks.reverse();
        let positions = blocks.iter().enumerate().map(|(pos, &id)| (id, pos)).collect();
        Self { blocks, positions }
    }

    pub fn tip(&self) -> NodeId {
        self.blocks[self.blocks.len() - 1]
    }

    pub fn blocks(&self) -> &[NodeId] {
        &self.blocks
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn position(&self, id: NodeId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Moves the chain to end at `new_tip`. Returns the removed blocks from the
    /// old tip down and the added blocks from the fork point up.
    pub fn reorg_to(&mut self, new_tip: NodeId, index: &BlockIndex) -> ConsensusResult<(Vec<NodeId>, Vec<NodeId>)> {
        let mut added = Vec::new();
        let mut current = new_tip;
        while !self.positions.contains_key(&current) {
            added.push(current);
            current = index
                .node(current)
                .selected_parent()
                .ok_or_else(|| ConsensusError::invariant(format!("block {} does not reach the selected chain", index.hash(new_tip))))?;
        }
        let fork = self.positions[&current];
        let removed: Vec<NodeId> = self.blocks.drain(fork + 1..).rev().collect();
        for id in &removed {
            self.positions.remove(id);
        }
        added.reverse();
        for &id in &added {
            self.positions.insert(id, self.blocks.len());
            self.blocks.push(id);
        }
        Ok((removed, added))
    }
}

pub struct DagContext {
    pub(crate) config: ConsensusConfig,
    pub(crate) index: BlockIndex,
    pub(crate) reachability: ReachabilityTree,
    pub(crate) storage: ConsensusStorage,
    pub(crate) genesis: NodeId,
    pub(crate) tips: HashSet<NodeId>,
    pub(crate) virtual_state: VirtualState,
    pub(crate) selected_chain: SelectedChain,
    pub(crate) last_finality_point: NodeId,
    pub(crate) finality_conflicts: Vec<FinalityConflict>,
    pub(crate) orphans: OrphanPool,
    pub(crate) delayed: DelayedBlocks,
    pub(crate) header_validator: HeaderValidator,
    pub(crate) block_validator: BlockValidator,
    pub(crate) tx_validator: TransactionValidator,
    pub(crate) difficulty: DifficultyManager,
    pub(crate) verifier: Arc<dyn ScriptVerifier>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) pending_events: Vec<ConsensusEvent>,
    /// Set whenever the last finality point moves; drained by the facade to
    /// schedule background finalization
    pub(crate) pending_finalization: Option<NodeId>,
}

impl DagContext {
    /// Opens the DAG held by `storage`, or initializes it with genesis when
    /// the storage is empty
    pub fn new(
        config: ConsensusConfig,
        storage: ConsensusStorage,
        verifier: Arc<dyn ScriptVerifier>,
        clock: Arc<dyn Clock>,
    ) -> ConsensusResult<Self> {
        let genesis_block = build_genesis(&config.params);
        let state = storage.load_dag_state()?;
        let mut ctx = Self::empty(config, storage, verifier, clock);
        match state {
            Some(state) => ctx.load(state, genesis_block.hash())?,
            None => ctx.init_genesis(genesis_block)?,
        }
        Ok(ctx)
    }

    fn empty(config: ConsensusConfig, storage: ConsensusStorage, verifier: Arc<dyn ScriptVerifier>, clock: Arc<dyn Clock>) -> Self {
        let genesis = NodeId::new(0);
        Self {
            header_validator: HeaderValidator::new(&config.params),
            block_validator: BlockValidator::new(&config.params),
            tx_validator: TransactionValidator::new(&config.params),
            difficulty: DifficultyManager::new(&config.params),
            orphans: OrphanPool::new(config.orphan_pool_capacity),
            delayed: DelayedBlocks::new(),
            config,
            index: BlockIndex::new(),
            reachability: ReachabilityTree::new(),
            storage,
            genesis,
            tips: HashSet::new(),
            virtual_state: VirtualState { selected_parent: genesis, parents: vec![genesis], ghostdag: GhostdagData::genesis() },
            selected_chain: SelectedChain::new(genesis),
            last_finality_point: genesis,
            finality_conflicts: Vec::new(),
            verifier,
            clock,
            pending_events: Vec::new(),
            pending_finalization: None,
        }
    }

    fn init_genesis(&mut self, block: consensus_core::block::Block) -> ConsensusResult<()> {
        let hash = block.hash();
        let genesis = self.index.add(BlockNode::new(block.header.clone(), vec![], GhostdagData::genesis(), BlockStatus::Valid, NodeId::new(0)));
        self.genesis = genesis;
        self.reachability.init_root(genesis);
        self.storage.blocks.insert(Arc::new(block));
        self.storage.utxo_diffs.insert_root(hash, UtxoDiff::new());
        self.storage.multisets.insert(hash, &Multiset::new());
        self.storage.acceptance.insert(hash, MergeSetAcceptanceData::new());
        self.tips.insert(genesis);
        self.selected_chain = SelectedChain::new(genesis);
        self.last_finality_point = genesis;
        let ghostdag = self.ghostdag_manager().ghostdag_with_selected_parent(genesis, &[genesis])?;
        self.virtual_state = VirtualState { selected_parent: genesis, parents: vec![genesis], ghostdag };
        self.update_virtual_utxo()?;
        self.commit()?;
        info!(%hash, net = %self.params().net, "initialized DAG with genesis");
        Ok(())
    }

    fn load(&mut self, state: DagState, genesis_hash: Hash) -> ConsensusResult<()> {
        for record in self.storage.load_block_index()? {
            self.index.add_record(record)?;
        }
        self.genesis = self
            .index
            .lookup(&genesis_hash)
            .ok_or_else(|| ConsensusError::invariant(format!("database does not contain genesis {genesis_hash} of this network")))?;
        self.reachability = ReachabilityTree::from_records(self.storage.load_reachability()?, &self.index)?;

        let lookup = |index: &BlockIndex, hashes: &[Hash]| {
            index.lookup_many(hashes).map_err(|e| ConsensusError::invariant(format!("loading DAG state: {e}")))
        };
        self.tips = lookup(&self.index, &state.tip_hashes)?.into_iter().collect();
        let virtual_parents = lookup(&self.index, &state.virtual_parents_hashes)?;
        let selected_parent =
            *virtual_parents.first().ok_or_else(|| ConsensusError::invariant("persisted virtual has no parents"))?;
        self.last_finality_point = lookup(&self.index, &[state.last_finality_point])?[0];
        self.finality_conflicts = state.finality_conflicts;
        self.storage.utxo_diffs.set_roots(state.diff_root_hashes);
        self.selected_chain = SelectedChain::from_tip(selected_parent, &self.index);
        let ghostdag = self.ghostdag_manager().ghostdag_with_selected_parent(selected_parent, &virtual_parents)?;
        self.virtual_state = VirtualState { selected_parent, parents: virtual_parents, ghostdag };

        self.resolve_virtual()?;
        self.commit()?;
        info!(
            blocks = self.index.len(),
            tips = self.tips.len(),
            selected_tip = %self.index.hash(selected_parent),
            "loaded DAG from storage"
        );
        Ok(())
    }

    pub fn params(&self) -> &Params {
        &self.config.params
    }

    pub fn ghostdag_manager(&self) -> GhostdagManager<'_> {
        GhostdagManager::new(self.params().ghostdag_k, &self.index, &self.reachability)
    }

    pub fn selected_tip(&self) -> NodeId {
        self.virtual_state.selected_parent
    }

    /// Whether a block with this blue score and hash would be preferred over the selected tip
    pub fn beats_selected_tip(&self, block: NodeId) -> bool {
        let manager = self.ghostdag_manager();
        manager.selection_key(block) > manager.selection_key(self.selected_tip())
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    pub fn take_events(&mut self) -> Vec<ConsensusEvent> {
        std::mem::take(&mut self.pending_events)
    }

    fn sorted_hashes(&self, ids: impl IntoIterator<Item = NodeId>) -> Vec<Hash> {
        let mut hashes = self.index.hashes(ids);
        hashes.sort();
        hashes
    }

    pub fn tip_hashes(&self) -> Vec<Hash> {
        self.sorted_hashes(self.tips.iter().copied())
    }

    pub fn valid_tip_hashes(&self) -> Vec<Hash> {
        self.sorted_hashes(self.tips.iter().copied().filter(|&tip| self.index.status(tip).is_valid()))
    }

    fn dag_state(&self) -> DagState {
        let mut diff_root_hashes: Vec<Hash> = self.storage.utxo_diffs.roots().copied().collect();
        diff_root_hashes.sort();
        DagState {
            tip_hashes: self.tip_hashes(),
            valid_tip_hashes: self.valid_tip_hashes(),
            virtual_parents_hashes: self.index.hashes(self.virtual_state.parents.iter().copied()),
            local_subnetwork_id: None,
            last_finality_point: self.index.hash(self.last_finality_point),
            diff_root_hashes,
            finality_conflicts: self.finality_conflicts.clone(),
        }
    }

    /// Writes everything touched since the last commit in one batch. On
    /// failure the dirty sets survive and the next commit retries them.
    pub fn commit(&mut self) -> ConsensusResult<()> {
        let state = self.dag_state();
        self.storage.commit(&self.index, &self.reachability, &state)?;
        self.index.clear_dirty();
        self.reachability.clear_dirty();
        self.storage.clear_dirty();
        Ok(())
    }
}
