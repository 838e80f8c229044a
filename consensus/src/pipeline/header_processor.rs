//! Header stage of the pipeline
//!
//! Context-free checks, the delay and orphan gates, and insertion of the
//! block node into the index, reachability tree and body store.

use crate::consensus::context::DagContext;
use crate::consensus::dag::index::{BlockNode, NodeId};
use crate::consensus::ghostdag::GhostdagData;
use crate::consensus::types::{BehaviorFlags, BlockStatus};
use crate::errors::ConsensusResult;
use consensus_core::block::Block;
use consensus_core::errors::RuleError;
use consensus_core::Hash;
use std::sync::Arc;

/// Whether a block can go on to contextual validation
pub(crate) enum Admission {
    /// Every parent is in the DAG
    Ready(Vec<NodeId>),
    /// Must wait until this local time
    Delay(i64),
    /// Some parent is unknown
    Orphan,
}

impl DagContext {
    pub(crate) fn check_block_in_isolation(&self, block: &Block) -> ConsensusResult<()> {
        self.header_validator.validate_header_in_isolation(&block.header)?;
        self.block_validator.validate_body_in_isolation(block)?;
        Ok(())
    }

    pub(crate) fn is_known_block(&self, hash: &Hash) -> bool {
        self.index.contains(hash) || self.orphans.contains(hash) || self.delayed.contains(hash)
    }

    /// Applies the delay and missing-parent gates
    pub(crate) fn admit_block(&self, block: &Block, flags: BehaviorFlags) -> ConsensusResult<Admission> {
        let hash = block.hash();
        if !flags.after_delay {
            if let Some(process_time) = self.header_validator.delayed_process_time(&block.header, self.now_millis()) {
                if flags.disallow_delay {
                    return Err(RuleError::DelayedBlockNotAllowed(hash).into());
                }
                return Ok(Admission::Delay(process_time));
            }
        }

        let parents = block.header.direct_parents();
        let missing: Vec<&Hash> = parents.iter().filter(|p| !self.index.contains(p)).collect();
        if missing.is_empty() {
            return Ok(Admission::Ready(self.index.lookup_many(parents)?));
        }
        // A child of a delayed block waits until just after its latest delayed parent
        let delayed_parent_time = missing.iter().filter_map(|p| self.delayed.process_time(p)).max();
        if let Some(time) = delayed_parent_time {
            return Ok(Admission::Delay(time + 1));
        }
        if flags.disallow_orphans {
            return Err(RuleError::OrphanBlockNotAllowed(hash).into());
        }
        Ok(Admission::Orphan)
    }

    /// Adds the block to the index, reachability tree and body store, and
    /// replaces its parents among the tips
    pub(crate) fn insert_block(&mut self, block: Block, parents: Vec<NodeId>, ghostdag: GhostdagData, status: BlockStatus) -> ConsensusResult<NodeId> {
        let finality_point = self.finality_point_for(&ghostdag);
        let selected_parent = ghostdag.selected_parent;
        let mergeset: Vec<NodeId> = ghostdag.mergeset_without_selected_parent().collect();
        let id = self.index.add(BlockNode::new(block.header.clone(), parents.clone(), ghostdag, status, finality_point));
        if let Some(sp) = selected_parent {
            self.reachability.add_block(id, sp, mergeset)?;
        }
        self.storage.blocks.insert(Arc::new(block));
        for parent in &parents {
            self.tips.remove(parent);
        }
        self.tips.insert(id);
        Ok(id)
    }
}
