//! Checks of a block against its place in the DAG
//!
//! Run after GHOSTDAG has classified the merge set but before the block is
//! inserted: parent relations, merge-set size, bounded merge depth,
//! difficulty, timestamp and the blue score claimed by the coinbase.

use crate::consensus::context::DagContext;
use crate::consensus::dag::index::NodeId;
use crate::consensus::ghostdag::GhostdagData;
use crate::errors::{ConsensusError, ConsensusResult};
use consensus_core::block::Block;
use consensus_core::coinbase::CoinbasePayload;
use consensus_core::errors::RuleError;

impl DagContext {
    /// No parent may be an ancestor of another parent
    pub(crate) fn check_parents_relations(&self, parents: &[NodeId]) -> ConsensusResult<()> {
        for &a in parents {
            for &b in parents {
                if a != b && self.reachability.is_dag_ancestor_of(a, b)? {
                    return Err(RuleError::InvalidParentsRelation(self.index.hash(a), self.index.hash(b)).into());
                }
            }
        }
        Ok(())
    }

    /// Parents outside the past of every other parent
    pub(crate) fn independent_parents(&self, parents: &[NodeId]) -> ConsensusResult<Vec<NodeId>> {
        let mut independent = Vec::with_capacity(parents.len());
        for &a in parents {
            let mut redundant = false;
            for &b in parents {
                if a != b && self.reachability.is_dag_ancestor_of(a, b)? {
                    redundant = true;
                    break;
                }
            }
            if !redundant {
                independent.push(a);
            }
        }
        Ok(independent)
    }

    pub(crate) fn validate_block_in_context(&self, block: &Block, ghostdag: &GhostdagData) -> ConsensusResult<()> {
        let selected_parent =
            ghostdag.selected_parent.ok_or_else(|| ConsensusError::invariant("contextual validation of a parentless block"))?;

        let mergeset_size = ghostdag.mergeset_size() as u64;
        let limit = self.params().merge_set_size_limit;
        if mergeset_size > limit {
            return Err(RuleError::ViolatingMergeLimit(mergeset_size, limit).into());
        }

        if let Some(&red) = self.bounded_merge_depth_violations(ghostdag)?.first() {
            return Err(RuleError::ViolatingBoundedMergeDepth(self.index.hash(red)).into());
        }

        let required_bits = self.required_difficulty(selected_parent);
        if block.header.bits != required_bits {
            return Err(RuleError::UnexpectedDifficulty {
                bits: block.header.bits,
                reason: format!("expected {required_bits:#010x}"),
            }
            .into());
        }

        let past_median_time = self.past_median_time(self.index.ghostdag(selected_parent));
        if block.header.timestamp <= past_median_time {
            return Err(RuleError::TimeTooOld(block.header.timestamp, past_median_time).into());
        }

        let coinbase = block.coinbase().ok_or(RuleError::NoTransactions)?;
        let payload = CoinbasePayload::deserialize(&coinbase.payload)?;
        if payload.blue_score != ghostdag.blue_score {
            return Err(RuleError::BadCoinbaseTransaction(format!(
                "coinbase claims blue score {}, block has {}",
                payload.blue_score, ghostdag.blue_score
            ))
            .into());
        }
        Ok(())
    }

    /// Reds of `ghostdag` merged too deep: the finality point is not in their
    /// past, and no blue whose own finality point is in their past covers them
    pub(crate) fn bounded_merge_depth_violations(&self, ghostdag: &GhostdagData) -> ConsensusResult<Vec<NodeId>> {
        let finality_point = self.finality_point_for(ghostdag);
        let mut violating = Vec::new();
        for &red in &ghostdag.mergeset_reds {
            if self.reachability.is_dag_ancestor_of(finality_point, red)? {
                continue;
            }
            let mut covered = false;
            for &blue in &ghostdag.mergeset_blues {
                if self.reachability.is_dag_ancestor_of(red, blue)?
                    && self.reachability.is_dag_ancestor_of(self.index.node(blue).finality_point, red)?
                {
                    covered = true;
                    break;
                }
            }
            if !covered {
                violating.push(red);
            }
        }
        Ok(violating)
    }
}
