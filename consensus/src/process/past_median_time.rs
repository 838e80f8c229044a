//! Past median time
//!
//! The median timestamp of a block's blue window. A new block must be stamped
//! strictly after the past median time of its selected parent, and lock times
//! of accepted transactions are measured against it.

use crate::consensus::context::DagContext;
use crate::consensus::dag::index::NodeId;
use crate::consensus::ghostdag::GhostdagData;
use crate::errors::{ConsensusError, ConsensusResult};

pub fn median_timestamp(mut timestamps: Vec<i64>) -> i64 {
    timestamps.sort_unstable();
    timestamps.get(timestamps.len() / 2).copied().unwrap_or_default()
}

impl DagContext {
    pub(crate) fn past_median_time(&self, ghostdag: &GhostdagData) -> i64 {
        let window = self.blue_window(ghostdag, self.params().past_median_time_window_size());
        median_timestamp(window.iter().map(|&b| self.index.node(b).timestamp()).collect())
    }

    pub(crate) fn block_past_median_time(&self, block: NodeId) -> i64 {
        self.past_median_time(self.index.ghostdag(block))
    }

    /// Past median time of the chain block right at or below `blue_score` on
    /// the selected chain of `chain_tip`
    pub(crate) fn selected_ancestor_median_time(&self, chain_tip: NodeId, blue_score: u64) -> ConsensusResult<i64> {
        let ancestor = self.selected_ancestor_at(chain_tip, blue_score)?;
        Ok(self.block_past_median_time(ancestor))
    }

    /// Highest block on the selected chain of `from` (inclusive) whose blue
    /// score does not exceed `blue_score`. Walks down until it meets the
    /// global selected chain, then binary searches it.
    pub(crate) fn selected_ancestor_at(&self, from: NodeId, blue_score: u64) -> ConsensusResult<NodeId> {
        let mut current = from;
        loop {
            if self.index.blue_score(current) <= blue_score {
                return Ok(current);
            }
            if let Some(pos) = self.selected_chain.position(current) {
                let chain = &self.selected_chain.blocks()[..=pos];
                let above = chain.partition_point(|&b| self.index.blue_score(b) <= blue_score);
                return Ok(chain[above.saturating_sub(1)]);
            }
            current = self
                .index
                .node(current)
                .selected_parent()
                .ok_or_else(|| ConsensusError::invariant("selected ancestor search ran past genesis"))?;
        }
    }
}
