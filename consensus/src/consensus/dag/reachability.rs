//! Reachability oracle over the block DAG
//!
//! The selected-parent tree is labeled with nested intervals: a node's interval
//! contains the intervals of its whole subtree, so chain ancestry is an interval
//! containment test. DAG ancestry that does not follow the tree is answered by
//! each node's future covering set, an interval-ordered list of the tree roots
//! of its future that lie outside its own subtree.
//!
//! Intervals are inclusive. A node with interval `[s, e]` hands `[s, e - 1]` to
//! its children. When that range is exhausted the subtree is relabeled from the
//! nearest ancestor that is large enough, see [`ReachabilityTree::reindex`].

use crate::consensus::dag::index::{BlockIndex, NodeId};
use crate::errors::{ConsensusError, ConsensusResult};
use consensus_core::Hash;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: u64,
    pub end: u64,
}

impl Interval {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Interval of the tree root. Both ends are kept off the integer bounds so
    /// that `start - 1` and `end + 1` never overflow.
    pub fn maximal() -> Self {
        Self::new(1, u64::MAX - 1)
    }

    pub fn empty_at(start: u64) -> Self {
        Self::new(start, start.saturating_sub(1))
    }

    pub fn size(&self) -> u64 {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn contains(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// The range available to the children of a node holding this interval
    fn children_capacity(&self) -> Interval {
        Interval::new(self.start, self.end.saturating_sub(1))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReachabilityData {
    pub interval: Interval,
    /// Tree parent, i.e. the selected parent
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Sorted by interval start
    pub future_covering_set: Vec<NodeId>,
}

/// Persisted form of [`ReachabilityData`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReachabilityRecord {
    pub interval: Interval,
    pub parent: Option<Hash>,
    pub children: Vec<Hash>,
    pub future_covering_set: Vec<Hash>,
}

#[derive(Default)]
pub struct ReachabilityTree {
    data: HashMap<NodeId, ReachabilityData>,
    dirty: HashSet<NodeId>,
}

impl ReachabilityTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init_root(&mut self, root: NodeId) {
        let data = ReachabilityData { interval: Interval::maximal(), parent: None, children: Vec::new(), future_covering_set: Vec::new() };
        self.data.insert(root, data);
        self.dirty.insert(root);
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.data.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> ConsensusResult<&ReachabilityData> {
        self.data.get(&id).ok_or_else(|| missing(id))
    }

    fn get_mut(&mut self, id: NodeId) -> ConsensusResult<&mut ReachabilityData> {
        self.dirty.insert(id);
        self.data.get_mut(&id).ok_or_else(|| missing(id))
    }

    pub fn interval(&self, id: NodeId) -> ConsensusResult<Interval> {
        Ok(self.get(id)?.interval)
    }

    fn start_of(&self, id: NodeId) -> u64 {
        self.data.get(&id).map_or(u64::MAX, |data| data.interval.start)
    }

    /// True if `ancestor` lies on the selected-parent chain of `descendant`, inclusive
    pub fn is_chain_ancestor_of(&self, ancestor: NodeId, descendant: NodeId) -> ConsensusResult<bool> {
        Ok(self.interval(ancestor)?.contains(&self.interval(descendant)?))
    }

    /// True if `ancestor` is in the past of `descendant` or equal to it
    pub fn is_dag_ancestor_of(&self, ancestor: NodeId, descendant: NodeId) -> ConsensusResult<bool> {
        if ancestor == descendant {
            return Ok(true);
        }
        let target = self.interval(descendant)?;
        let data = self.get(ancestor)?;
        if data.interval.contains(&target) {
            return Ok(true);
        }
        let fcs = &data.future_covering_set;
        let pos = fcs.partition_point(|&item| self.start_of(item) <= target.start);
        if pos == 0 {
            return Ok(false);
        }
        Ok(self.interval(fcs[pos - 1])?.contains(&target))
    }

    /// True if `ancestor` is in the past of any of `descendants` (or one of them)
    pub fn is_dag_ancestor_of_any(&self, ancestor: NodeId, descendants: &[NodeId]) -> ConsensusResult<bool> {
        for &descendant in descendants {
            if self.is_dag_ancestor_of(ancestor, descendant)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Adds `new` as a tree child of its selected parent and records it in the
    /// future covering set of every other merge-set block.
    pub fn add_block(
        &mut self,
        new: NodeId,
        selected_parent: NodeId,
        mergeset_without_selected_parent: impl IntoIterator<Item = NodeId>,
    ) -> ConsensusResult<()> {
        if self.data.contains_key(&new) {
            return Err(ConsensusError::invariant(format!("reachability data of node {new:?} already exists")));
        }
        self.add_tree_child(selected_parent, new)?;
        for merged in mergeset_without_selected_parent {
            self.insert_to_future_covering_set(merged, new)?;
        }
        Ok(())
    }

    fn add_tree_child(&mut self, parent: NodeId, child: NodeId) -> ConsensusResult<()> {
        let parent_data = self.get(parent)?;
        let capacity = parent_data.interval.children_capacity();
        let is_first_child = parent_data.children.is_empty();
        let remaining = match parent_data.children.last() {
            Some(&last) => Interval::new(self.interval(last)?.end + 1, capacity.end),
            None => capacity,
        };

        let r = remaining.size();
        let interval = if r == 0 {
            Interval::empty_at(remaining.start)
        } else {
            let allocated = if is_first_child { r - r / 64 } else { r.div_ceil(2) };
            Interval::new(remaining.start, remaining.start + allocated - 1)
        };
        self.data.insert(child, ReachabilityData { interval, parent: Some(parent), children: Vec::new(), future_covering_set: Vec::new() });
        self.dirty.insert(child);
        self.get_mut(parent)?.children.push(child);

        if r == 0 {
            self.reindex(child)?;
        }
        Ok(())
    }

    /// Relabels the subtree of the lowest ancestor of `new_leaf` whose interval
    /// can hold its subtree. Each child gets its exact subtree size plus a share
    /// of the slack proportional to that size plus one; the relabeled root keeps
    /// a small tail reserve for future children and inner nodes hand their
    /// remainder to their last child.
    fn reindex(&mut self, new_leaf: NodeId) -> ConsensusResult<()> {
        let mut sizes = HashMap::new();
        let mut current = self.get(new_leaf)?.parent.ok_or_else(|| ConsensusError::invariant("reindexing the reachability root"))?;
        loop {
            let required = self.subtree_size(current, &mut sizes)?;
            if self.interval(current)?.size() >= required {
                break;
            }
            current = self.get(current)?.parent.ok_or_else(|| ConsensusError::invariant("reachability tree root is out of capacity"))?;
        }
        tracing::debug!(root = ?current, subtree_size = sizes.get(&current).copied().unwrap_or_default(), "reindexing reachability subtree");
        self.propagate_intervals(current, &sizes)
    }

    /// Subtree sizes of `root` and every descendant, memoized in `sizes`
    fn subtree_size(&self, root: NodeId, sizes: &mut HashMap<NodeId, u64>) -> ConsensusResult<u64> {
        let mut stack = vec![(root, false)];
        while let Some((node, expanded)) = stack.pop() {
            if sizes.contains_key(&node) {
                continue;
            }
            let children = &self.get(node)?.children;
            if expanded {
                let size = 1 + children.iter().map(|c| sizes.get(c).copied().unwrap_or_default()).sum::<u64>();
                sizes.insert(node, size);
            } else {
                stack.push((node, true));
                stack.extend(children.iter().filter(|c| !sizes.contains_key(c)).map(|&c| (c, false)));
            }
        }
        sizes.get(&root).copied().ok_or_else(|| ConsensusError::invariant("subtree size was not computed"))
    }

    fn propagate_intervals(&mut self, root: NodeId, sizes: &HashMap<NodeId, u64>) -> ConsensusResult<()> {
        let mut stack = vec![(root, self.interval(root)?)];
        while let Some((node, interval)) = stack.pop() {
            let data = self.get_mut(node)?;
            data.interval = interval;
            if data.children.is_empty() {
                continue;
            }
            let children = data.children.clone();

            let capacity = interval.children_capacity();
            let child_sizes: Vec<u64> = children.iter().map(|c| sizes.get(c).copied().unwrap_or(1)).collect();
            let needed: u64 = child_sizes.iter().sum();
            let slack = capacity
                .size()
                .checked_sub(needed)
                .ok_or_else(|| ConsensusError::invariant(format!("interval {interval:?} cannot hold subtree of {node:?}")))?;
            let reserve = if node == root { slack / 64 } else { 0 };
            let distributable = slack - reserve;
            let total_weight: u128 = child_sizes.iter().map(|&s| s as u128 + 1).sum();

            let mut start = capacity.start;
            let mut distributed = 0u64;
            for (i, (&child, &size)) in children.iter().zip(&child_sizes).enumerate() {
                let extra = if i + 1 == children.len() {
                    distributable - distributed
                } else {
                    (distributable as u128 * (size as u128 + 1) / total_weight) as u64
                };
                distributed += extra;
                let allocated = size + extra;
                stack.push((child, Interval::new(start, start + allocated - 1)));
                start += allocated;
            }
        }
        Ok(())
    }

    fn insert_to_future_covering_set(&mut self, merged: NodeId, new: NodeId) -> ConsensusResult<()> {
        let target = self.interval(new)?;
        let fcs = &self.get(merged)?.future_covering_set;
        let pos = fcs.partition_point(|&item| self.start_of(item) <= target.start);
        if pos > 0 && self.interval(fcs[pos - 1])?.contains(&target) {
            // Already covered by a tree ancestor of `new`
            return Ok(());
        }
        self.get_mut(merged)?.future_covering_set.insert(pos, new);
        Ok(())
    }

    pub fn dirty(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.dirty.iter().copied()
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    pub fn to_record(&self, id: NodeId, index: &BlockIndex) -> ConsensusResult<ReachabilityRecord> {
        let data = self.get(id)?;
        Ok(ReachabilityRecord {
            interval: data.interval,
            parent: data.parent.map(|p| index.hash(p)),
            children: index.hashes(data.children.iter().copied()),
            future_covering_set: index.hashes(data.future_covering_set.iter().copied()),
        })
    }

    pub fn from_records(records: Vec<(Hash, ReachabilityRecord)>, index: &BlockIndex) -> ConsensusResult<Self> {
        let resolve = |hash: &Hash| {
            index.lookup(hash).ok_or_else(|| ConsensusError::invariant(format!("reachability data references unknown block {hash}")))
        };
        let mut data = HashMap::with_capacity(records.len());
        for (hash, record) in records {
            let id = resolve(&hash)?;
            let entry = ReachabilityData {
                interval: record.interval,
                parent: record.parent.as_ref().map(resolve).transpose()?,
                children: record.children.iter().map(resolve).collect::<ConsensusResult<_>>()?,
                future_covering_set: record.future_covering_set.iter().map(resolve).collect::<ConsensusResult<_>>()?,
            };
            data.insert(id, entry);
        }
        Ok(Self { data, dirty: HashSet::new() })
    }
}

fn missing(id: NodeId) -> ConsensusError {
    ConsensusError::invariant(format!("missing reachability data for node {id:?}"))
}
