//! The virtual block
//!
//! The virtual is the block a miner would build on top of every tip. Its
//! selected parent is the best tip that has the last finality point on its
//! chain and passes UTXO verification; a tip failing that is skipped in favor
//! of its parents. The rest of the tips are merged as long as the merge set
//! stays within the limit and bounded merge depth holds. The full UTXO set is
//! always the virtual's UTXO set.

use crate::consensus::context::{DagContext, VirtualState};
use crate::consensus::dag::index::NodeId;
use crate::consensus::ghostdag::GhostdagData;
use crate::consensus::notify::ConsensusEvent;
use crate::errors::{ConsensusError, ConsensusResult};
use crate::pipeline::body_processor::ChainVerification;
use consensus_core::Hash;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet, VecDeque};
use tracing::{debug, info};

impl DagContext {
    /// Recomputes the virtual from the current tips, moves the selected chain,
    /// updates the full UTXO set and advances the last finality point
    pub(crate) fn resolve_virtual(&mut self) -> ConsensusResult<()> {
        let (selected_parent, parents, ghostdag) = self.pick_virtual_parents()?;
        if parents == self.virtual_state.parents && selected_parent == self.virtual_state.selected_parent {
            return Ok(());
        }

        if selected_parent != self.selected_chain.tip() {
            let (removed, added) = self.selected_chain.reorg_to(selected_parent, &self.index)?;
            if !removed.is_empty() {
                info!(removed = removed.len(), added = added.len(), tip = %self.index.hash(selected_parent), "selected chain reorganized");
            }
            self.pending_events.push(ConsensusEvent::ChainChanged {
                removed: self.index.hashes(removed),
                added: self.index.hashes(added),
            });
        }
        self.virtual_state = VirtualState { selected_parent, parents, ghostdag };
        self.update_virtual_utxo()?;
        self.update_finality_point();
        Ok(())
    }

    /// Rebuilds the full UTXO set as the virtual's set and re-expresses the
    /// diff roots against it
    pub(crate) fn update_virtual_utxo(&mut self) -> ConsensusResult<()> {
        let ghostdag = self.virtual_state.ghostdag.clone();
        let base = self.restore_utxo_diff(self.virtual_state.selected_parent)?;
        let accepting = self.accepting_block(&ghostdag)?;
        let outcome = self.calc_acceptance(&ghostdag, base, None, accepting)?;
        self.storage.utxo_diffs.apply_virtual_diff(&outcome.diff)?;
        self.storage.utxo_set.meld(&outcome.diff);
        debug!(
            blue_score = ghostdag.blue_score,
            parents = self.virtual_state.parents.len(),
            changed = outcome.diff.len(),
            "virtual UTXO set updated"
        );
        Ok(())
    }

    fn selection_entry(&self, block: NodeId) -> (u64, Reverse<Hash>, NodeId) {
        let (blue_score, hash) = self.ghostdag_manager().selection_key(block);
        (blue_score, hash, block)
    }

    /// A tip can be the virtual's selected parent if the last finality point
    /// is on its chain and it is (or can now be) UTXO verified
    fn is_selectable(&mut self, block: NodeId) -> ConsensusResult<bool> {
        if !self.reachability.is_chain_ancestor_of(self.last_finality_point, block)? {
            return Ok(false);
        }
        let status = self.index.status(block);
        if status.is_valid() {
            return Ok(true);
        }
        if status.is_disqualified_from_chain() || status.is_finality_violator() {
            return Ok(false);
        }
        Ok(self.verify_chain(block)? == ChainVerification::Valid)
    }

    fn is_unmergeable(&self, block: NodeId) -> bool {
        let status = self.index.status(block);
        status.is_disqualified_from_chain() || status.is_finality_violator()
    }

    fn pick_virtual_parents(&mut self) -> ConsensusResult<(NodeId, Vec<NodeId>, GhostdagData)> {
        let mut candidates: BinaryHeap<(u64, Reverse<Hash>, NodeId)> = self.tips.iter().map(|&tip| self.selection_entry(tip)).collect();
        let mut queued: HashSet<NodeId> = self.tips.clone();
        let mut bad: HashSet<NodeId> = HashSet::new();

        let selected_parent = loop {
            let (_, _, candidate) = candidates.pop().ok_or_else(|| ConsensusError::invariant("no block can be the virtual's selected parent"))?;
            if self.is_selectable(candidate)? {
                break candidate;
            }
            bad.insert(candidate);
            for &parent in &self.index.node(candidate).parents {
                if queued.contains(&parent) {
                    continue;
                }
                let all_children_out =
                    self.index.node(parent).children.iter().all(|&child| bad.contains(&child) || self.is_unmergeable(child));
                if all_children_out {
                    queued.insert(parent);
                    candidates.push(self.selection_entry(parent));
                }
            }
        };

        let mut parents = vec![selected_parent];
        let mut mergeset: HashSet<NodeId> = HashSet::from([selected_parent]);
        let limit = self.params().merge_set_size_limit;
        let max_parents = self.params().max_block_parents;
        let mut others: Vec<NodeId> =
            self.tips.iter().copied().filter(|&t| t != selected_parent && !bad.contains(&t) && !self.is_unmergeable(t)).collect();
        others.sort_by_key(|&t| Reverse(self.ghostdag_manager().selection_key(t)));

        for tip in others {
            if parents.len() >= max_parents {
                break;
            }
            let mut related = false;
            for &parent in &parents {
                if self.reachability.is_dag_ancestor_of(tip, parent)? || self.reachability.is_dag_ancestor_of(parent, tip)? {
                    related = true;
                    break;
                }
            }
            if related {
                continue;
            }
            let added = self.merge_cost(tip, selected_parent, &mergeset)?;
            if (mergeset.len() + added.len()) as u64 > limit {
                debug!(tip = %self.index.hash(tip), "tip left out of the virtual by the merge set limit");
                continue;
            }
            mergeset.extend(added);
            parents.push(tip);
        }

        loop {
            let ghostdag = self.ghostdag_manager().ghostdag_with_selected_parent(selected_parent, &parents)?;
            let violating = self.bounded_merge_depth_violations(&ghostdag)?;
            if violating.is_empty() {
                return Ok((selected_parent, parents, ghostdag));
            }
            let mut kept = Vec::with_capacity(parents.len());
            for &parent in &parents {
                let mut drop = false;
                if parent != selected_parent {
                    for &red in &violating {
                        if self.reachability.is_dag_ancestor_of(red, parent)? {
                            drop = true;
                            break;
                        }
                    }
                }
                if !drop {
                    kept.push(parent);
                }
            }
            if kept.len() == parents.len() {
                return Err(ConsensusError::invariant("bounded merge depth violation without an offending virtual parent"));
            }
            debug!(dropped = parents.len() - kept.len(), "virtual parents dropped for bounded merge depth");
            parents = kept;
        }
    }

    /// Blocks `tip` would add to the virtual's merge set: its past (itself
    /// included) outside the selected parent's past and not yet merged
    fn merge_cost(&self, tip: NodeId, selected_parent: NodeId, mergeset: &HashSet<NodeId>) -> ConsensusResult<Vec<NodeId>> {
        let mut added = Vec::new();
        let mut visited = HashSet::from([tip]);
        let mut queue = VecDeque::from([tip]);
        while let Some(current) = queue.pop_front() {
            if mergeset.contains(&current) || self.reachability.is_dag_ancestor_of(current, selected_parent)? {
                continue;
            }
            added.push(current);
            for &parent in &self.index.node(current).parents {
                if visited.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }
        Ok(added)
    }
}
