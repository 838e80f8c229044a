//! Finality
//!
//! The last finality point is a selected-chain block the node will not reorg
//! below. It moves forward one finality window at a time as the selected
//! chain grows. A block whose selected chain does not contain it violates
//! finality; when such a block beats the selected tip the node records a
//! finality conflict and waits for an operator to pick a side.

use crate::consensus::context::DagContext;
use crate::consensus::dag::index::NodeId;
use crate::consensus::ghostdag::GhostdagData;
use crate::consensus::notify::ConsensusEvent;
use crate::consensus::types::{BlockStatus, FinalityConflict};
use crate::errors::{ConsensusError, ConsensusResult};
use consensus_core::Hash;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};

impl DagContext {
    pub(crate) fn finality_score(&self, blue_score: u64) -> u64 {
        blue_score / self.params().finality_interval()
    }

    /// The selected-chain block one finality interval below a block with this
    /// GHOSTDAG data; genesis for blocks closer than that
    pub(crate) fn finality_point_for(&self, ghostdag: &GhostdagData) -> NodeId {
        let interval = self.params().finality_interval();
        match ghostdag.selected_parent {
            Some(sp) if ghostdag.blue_score >= interval => {
                self.selected_ancestor_at(sp, ghostdag.blue_score - interval).unwrap_or(self.genesis)
            }
            _ => self.genesis,
        }
    }

    /// A block violates finality when the last finality point is not on the
    /// selected chain of its selected parent
    pub(crate) fn is_violating_finality(&self, selected_parent: NodeId) -> ConsensusResult<bool> {
        Ok(!self.reachability.is_chain_ancestor_of(self.last_finality_point, selected_parent)?)
    }

    /// Moves the last finality point up the selected chain while the selected
    /// tip is at least one finality window ahead of it
    pub(crate) fn update_finality_point(&mut self) {
        let tip_score = self.finality_score(self.index.blue_score(self.selected_chain.tip()));
        let mut finality_point = self.last_finality_point;
        if self.selected_chain.position(finality_point).is_none() {
            warn!(finality_point = %self.index.hash(finality_point), "last finality point is off the selected chain");
            return;
        }
        while tip_score > self.finality_score(self.index.blue_score(finality_point)) {
            let score = self.finality_score(self.index.blue_score(finality_point));
            let chain = self.selected_chain.blocks();
            let next = chain.partition_point(|&b| self.finality_score(self.index.blue_score(b)) <= score);
            match chain.get(next) {
                Some(&block) => finality_point = block,
                None => break,
            }
        }
        if finality_point != self.last_finality_point {
            info!(
                finality_point = %self.index.hash(finality_point),
                blue_score = self.index.blue_score(finality_point),
                "last finality point moved"
            );
            self.last_finality_point = finality_point;
            self.pending_finalization = Some(finality_point);
        }
    }

    /// Opens a conflict for a violator that beat the selected tip, unless one
    /// is already open against the same tip
    pub(crate) fn register_finality_conflict(&mut self, violating: NodeId) {
        let tip_hash = self.index.hash(self.selected_tip());
        if self.finality_conflicts.iter().any(|c| c.is_open() && c.current_selected_tip_hash == tip_hash) {
            debug!(violating = %self.index.hash(violating), "finality conflict already open for the selected tip");
            return;
        }
        let id = self.finality_conflicts.iter().map(|c| c.id).max().unwrap_or(0) + 1;
        let conflict = FinalityConflict {
            id,
            conflict_time: self.now_millis(),
            current_selected_tip_hash: tip_hash,
            violating_block_hash: self.index.hash(violating),
            resolution_time: None,
        };
        warn!(id, current_selected_tip = %tip_hash, violating_block = %conflict.violating_block_hash, "finality conflict");
        self.pending_events.push(ConsensusEvent::FinalityConflict {
            id,
            current_selected_tip: tip_hash,
            violating_block: conflict.violating_block_hash,
        });
        self.finality_conflicts.push(conflict);
    }

    /// Settles an open conflict. `valid` and `invalid` must split between the
    /// two branches that fork at the highest common chain ancestor: either
    /// the violating branch is declared valid (the node switches to it and
    /// the fork becomes the finality point) or it is declared invalid.
    pub(crate) fn resolve_finality_conflict(&mut self, id: u64, valid: &[Hash], invalid: &[Hash]) -> ConsensusResult<()> {
        let pos = self.finality_conflicts.iter().position(|c| c.id == id).ok_or(ConsensusError::UnknownFinalityConflict(id))?;
        let conflict = self.finality_conflicts[pos].clone();
        if !conflict.is_open() {
            return Err(ConsensusError::InvalidConflictResolution(format!("conflict {id} is already resolved")));
        }
        if valid.is_empty() && invalid.is_empty() {
            return Err(ConsensusError::InvalidConflictResolution("no blocks given".to_string()));
        }
        let lookup = |hashes: &[Hash]| -> ConsensusResult<Vec<NodeId>> {
            hashes.iter().map(|h| self.index.lookup(h).ok_or(ConsensusError::UnknownBlock(*h))).collect()
        };
        let valid_ids = lookup(valid)?;
        let invalid_ids = lookup(invalid)?;
        let current = self.index.get(&conflict.current_selected_tip_hash)?;
        let violating = self.index.get(&conflict.violating_block_hash)?;

        let fork = self.common_chain_ancestor(current, violating)?;
        let current_start = self.chain_child_towards(fork, current)?;
        let violating_start = self.chain_child_towards(fork, violating)?;
        let all_below = |start: NodeId, ids: &[NodeId]| -> ConsensusResult<bool> {
            for &id in ids {
                if !self.reachability.is_dag_ancestor_of(start, id)? {
                    return Ok(false);
                }
            }
            Ok(true)
        };
        let switch = all_below(violating_start, &valid_ids)? && all_below(current_start, &invalid_ids)?;
        let keep = all_below(current_start, &valid_ids)? && all_below(violating_start, &invalid_ids)?;
        if switch == keep {
            return Err(ConsensusError::InvalidConflictResolution(
                "blocks do not split between the current and the violating branch".to_string(),
            ));
        }

        for &block in &invalid_ids {
            self.reject_with_descendants(block);
        }
        for &block in &valid_ids {
            self.clear_chain_violations(block, fork);
        }
        if switch {
            info!(id, fork = %self.index.hash(fork), "switching to the violating branch");
            self.last_finality_point = fork;
        } else {
            info!(id, "keeping the current branch");
        }
        self.resolve_virtual()?;

        let finality_point = self.index.hash(self.last_finality_point);
        self.finality_conflicts[pos].resolution_time = Some(self.now_millis());
        self.pending_events.push(ConsensusEvent::FinalityConflictResolved { id, finality_point });
        self.commit()
    }

    /// Highest block on the selected chain of `b` that is also on the
    /// selected chain of `a`
    fn common_chain_ancestor(&self, a: NodeId, b: NodeId) -> ConsensusResult<NodeId> {
        let mut current = b;
        loop {
            if self.reachability.is_chain_ancestor_of(current, a)? {
                return Ok(current);
            }
            current = self
                .index
                .node(current)
                .selected_parent()
                .ok_or_else(|| ConsensusError::invariant("selected chains do not meet at genesis"))?;
        }
    }

    /// The child of `ancestor` on the selected chain of `descendant`
    fn chain_child_towards(&self, ancestor: NodeId, descendant: NodeId) -> ConsensusResult<NodeId> {
        let mut current = descendant;
        loop {
            match self.index.node(current).selected_parent() {
                Some(sp) if sp == ancestor => return Ok(current),
                Some(sp) => current = sp,
                None => {
                    return Err(ConsensusError::InvalidConflictResolution(format!(
                        "{} does not descend from the fork point",
                        self.index.hash(descendant)
                    )))
                }
            }
        }
    }

    fn reject_with_descendants(&mut self, block: NodeId) {
        let mut queue = VecDeque::from([block]);
        let mut visited = HashSet::from([block]);
        while let Some(current) = queue.pop_front() {
            let status = self.index.status(current);
            if !matches!(status, BlockStatus::ValidateFailed | BlockStatus::InvalidAncestor) {
                self.index.set_status(current, BlockStatus::ManuallyRejected);
            }
            for &child in &self.index.node(current).children {
                if visited.insert(child) {
                    queue.push_back(child);
                }
            }
        }
    }

    /// Makes `block` and its selected chain down to `fork` eligible for
    /// verification again
    fn clear_chain_violations(&mut self, block: NodeId, fork: NodeId) {
        let mut current = block;
        while current != fork {
            let status = self.index.status(current);
            if status.is_finality_violator() || status == BlockStatus::ManuallyRejected {
                self.index.set_status(current, BlockStatus::UTXONotVerified);
            }
            match self.index.node(current).selected_parent() {
                Some(sp) => current = sp,
                None => break,
            }
        }
    }

    /// Marks the past of `finality_point` as finalized and drops UTXO diffs
    /// that fell out of reach: those of finalized blocks and those far below
    /// the selected tip. Root diffs of invalid blocks are deleted too, and
    /// with pruning enabled so are root diffs of finalized blocks.
    pub(crate) fn finalize_past(&mut self, finality_point: NodeId) -> ConsensusResult<()> {
        let mut queue: VecDeque<NodeId> = self.index.node(finality_point).parents.iter().copied().collect();
        let mut finalized = Vec::new();
        while let Some(current) = queue.pop_front() {
            if self.index.node(current).is_finalized {
                continue;
            }
            self.index.node_mut(current).is_finalized = true;
            finalized.push(current);
            queue.extend(self.index.node(current).parents.iter().copied());
        }

        let prune = self.config.prune_finalized_diffs;
        for &block in &finalized {
            let hash = self.index.hash(block);
            if prune {
                self.storage.utxo_diffs.delete(&hash);
            } else {
                self.storage.utxo_diffs.evict(&hash);
            }
        }
        let mut candidates: Vec<Hash> = self.storage.utxo_diffs.roots().copied().collect();
        let mut dropped = 0usize;
        while let Some(hash) = candidates.pop() {
            let Some(id) = self.index.lookup(&hash) else { continue };
            let node = self.index.node(id);
            if !node.status.is_invalid() && !(prune && node.is_finalized) {
                continue;
            }
            let parents = self.index.hashes(node.parents.iter().copied());
            candidates.extend(self.storage.utxo_diffs.drop_root(&hash, &parents)?);
            dropped += 1;
        }

        let horizon = self.index.blue_score(self.selected_tip()).saturating_sub(self.config.utxo_diff_eviction_window);
        let mut evicted = 0usize;
        for hash in self.storage.utxo_diffs.cached_hashes() {
            if self.index.lookup(&hash).is_some_and(|id| self.index.blue_score(id) < horizon) && self.storage.utxo_diffs.evict(&hash) {
                evicted += 1;
            }
        }
        debug!(finalized = finalized.len(), dropped, evicted, "finalized past of the finality point");
        self.commit()
    }
}
