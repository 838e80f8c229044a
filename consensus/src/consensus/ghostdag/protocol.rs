//! GHOSTDAG coloring
//!
//! Picks the selected parent, collects the merge set (the anticone of the
//! selected parent inside the new block's past) and colors it: a candidate is
//! blue iff its blue anticone stays within `k` and it does not push the blue
//! anticone of any existing blue above `k`.

use super::data::GhostdagData;
use crate::consensus::dag::index::{BlockIndex, NodeId};
use crate::consensus::dag::reachability::ReachabilityTree;
use crate::errors::{ConsensusError, ConsensusResult};
use consensus_core::{Hash, KType};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet, VecDeque};

pub struct GhostdagManager<'a> {
    k: KType,
    index: &'a BlockIndex,
    reachability: &'a ReachabilityTree,
}

impl<'a> GhostdagManager<'a> {
    pub fn new(k: KType, index: &'a BlockIndex, reachability: &'a ReachabilityTree) -> Self {
        Self { k, index, reachability }
    }

    /// Total order over blocks: blue score, then hash
    pub fn sort_key(&self, block: NodeId) -> (u64, Hash) {
        (self.index.blue_score(block), self.index.hash(block))
    }

    /// Key under which the maximum is the preferred block: higher blue score, then smaller hash
    pub fn selection_key(&self, block: NodeId) -> (u64, Reverse<Hash>) {
        (self.index.blue_score(block), Reverse(self.index.hash(block)))
    }

    pub fn find_selected_parent(&self, parents: &[NodeId]) -> ConsensusResult<NodeId> {
        parents
            .iter()
            .copied()
            .max_by_key(|&p| self.selection_key(p))
            .ok_or_else(|| ConsensusError::invariant("ghostdag invoked without parents"))
    }

    pub fn ghostdag(&self, parents: &[NodeId]) -> ConsensusResult<GhostdagData> {
        let selected_parent = self.find_selected_parent(parents)?;
        self.ghostdag_with_selected_parent(selected_parent, parents)
    }

    /// Runs the coloring with a fixed selected parent. Used directly for the
    /// virtual, whose selected parent is chosen by validity rather than score.
    pub fn ghostdag_with_selected_parent(&self, selected_parent: NodeId, parents: &[NodeId]) -> ConsensusResult<GhostdagData> {
        let mut new_block_data = GhostdagData::new_with_selected_parent(selected_parent, self.k);
        for candidate in self.ordered_mergeset_without_selected_parent(selected_parent, parents)? {
            match self.check_blue_candidate(&new_block_data, candidate)? {
                Some((blue_anticone_size, affected)) => new_block_data.add_blue(candidate, blue_anticone_size, &affected),
                None => new_block_data.add_red(candidate),
            }
        }
        new_block_data.blue_score = self.index.blue_score(selected_parent) + new_block_data.mergeset_blues.len() as u64;
        Ok(new_block_data)
    }

    /// Anticone of the selected parent within the past of `parents`, sorted by (blue score, hash)
    pub fn ordered_mergeset_without_selected_parent(&self, selected_parent: NodeId, parents: &[NodeId]) -> ConsensusResult<Vec<NodeId>> {
        let mut queue: VecDeque<NodeId> = parents.iter().copied().filter(|&p| p != selected_parent).collect();
        let mut mergeset: HashSet<NodeId> = queue.iter().copied().collect();
        let mut past_of_selected: HashSet<NodeId> = HashSet::new();

        while let Some(current) = queue.pop_front() {
            for &parent in &self.index.node(current).parents {
                if mergeset.contains(&parent) || past_of_selected.contains(&parent) {
                    continue;
                }
                if self.reachability.is_dag_ancestor_of(parent, selected_parent)? {
                    past_of_selected.insert(parent);
                    continue;
                }
                mergeset.insert(parent);
                queue.push_back(parent);
            }
        }

        let mut ordered: Vec<NodeId> = mergeset.into_iter().collect();
        ordered.sort_by_key(|&b| self.sort_key(b));
        Ok(ordered)
    }

    /// Returns the candidate's blue anticone size and the recorded sizes of the
    /// blues in its anticone if it can be colored blue, `None` for red.
    fn check_blue_candidate(
        &self,
        new_block_data: &GhostdagData,
        candidate: NodeId,
    ) -> ConsensusResult<Option<(KType, HashMap<NodeId, KType>)>> {
        // The selected parent is always blue, so k + 1 blues is the maximum
        if new_block_data.mergeset_blues.len() == self.k as usize + 1 {
            return Ok(None);
        }

        let mut candidate_blues_anticone_sizes = HashMap::with_capacity(self.k as usize);
        let mut candidate_blue_anticone_size: KType = 0;
        let mut chain_block: Option<NodeId> = None;
        let mut chain_data = new_block_data;

        loop {
            // Once the chain block is in the past of the candidate, every remaining
            // blue is too, so the candidate's anticone cannot grow further. The
            // new block itself is always in the candidate's future.
            if let Some(block) = chain_block {
                if self.reachability.is_dag_ancestor_of(block, candidate)? {
                    return Ok(Some((candidate_blue_anticone_size, candidate_blues_anticone_sizes)));
                }
            }

            for &blue in &chain_data.mergeset_blues {
                if self.reachability.is_dag_ancestor_of(blue, candidate)? {
                    continue;
                }
                let size = self.blue_anticone_size(blue, new_block_data)?;
                if size > self.k {
                    return Err(ConsensusError::BlueAnticoneOverflow { block: self.index.hash(blue), size, k: self.k });
                }
                candidate_blues_anticone_sizes.insert(blue, size);

                candidate_blue_anticone_size = candidate_blue_anticone_size
                    .checked_add(1)
                    .ok_or_else(|| ConsensusError::invariant("blue anticone overflow of candidate"))?;
                if candidate_blue_anticone_size > self.k {
                    // The candidate's own blue anticone exceeds k
                    return Ok(None);
                }
                if size == self.k {
                    // A blue in the candidate's anticone already has k blues in its anticone
                    return Ok(None);
                }
            }

            let selected_parent =
                chain_data.selected_parent.ok_or_else(|| ConsensusError::invariant("coloring walked below genesis"))?;
            chain_block = Some(selected_parent);
            chain_data = self.index.ghostdag(selected_parent);
        }
    }

    /// Blue anticone size of `block` in the worldview of `context`, found in the
    /// nearest chain block that recorded it
    fn blue_anticone_size(&self, block: NodeId, context: &GhostdagData) -> ConsensusResult<KType> {
        let mut sizes = &context.blues_anticone_sizes;
        let mut selected_parent = context.selected_parent;
        loop {
            if let Some(&size) = sizes.get(&block) {
                return Ok(size);
            }
            let current = selected_parent
                .ok_or_else(|| ConsensusError::invariant(format!("block {block:?} is not in the blue set of the given context")))?;
            let data = self.index.ghostdag(current);
            sizes = &data.blues_anticone_sizes;
            selected_parent = data.selected_parent;
        }
    }
}
