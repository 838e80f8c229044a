//! Block processor
//!
//! Drives a block through the pipeline: duplicate and sanity checks, the
//! delay and orphan gates, contextual validation, insertion with a status,
//! UTXO verification when the block would become the selected tip, and the
//! virtual update. Every accepted block ends in one commit. Orphans and
//! delayed blocks released by the new block are processed in the same call.

use crate::consensus::context::DagContext;
use crate::consensus::notify::ConsensusEvent;
use crate::consensus::types::{BehaviorFlags, BlockOutcome, BlockStatus, ProcessResult};
use crate::errors::{ConsensusError, ConsensusResult};
use crate::pipeline::body_processor::ChainVerification;
use crate::pipeline::header_processor::Admission;
use consensus_core::block::Block;
use consensus_core::errors::RuleError;
use consensus_core::Hash;
use std::cmp::Reverse;
use std::collections::VecDeque;
use tracing::{debug, warn};

impl DagContext {
    pub(crate) fn process_block(&mut self, block: Block, flags: BehaviorFlags) -> ConsensusResult<ProcessResult> {
        let hash = block.hash();
        let outcome = self.process_single(block, flags)?;
        let mut result = ProcessResult::new(hash, outcome);
        if result.is_accepted() {
            result.released = self.process_orphans(hash)?;
        }
        result.released.extend(self.process_delayed_blocks()?);
        Ok(result)
    }

    /// Processes delayed blocks whose time has come
    pub(crate) fn tick(&mut self) -> ConsensusResult<Vec<Hash>> {
        self.process_delayed_blocks()
    }

    fn process_single(&mut self, block: Block, flags: BehaviorFlags) -> ConsensusResult<BlockOutcome> {
        let hash = block.hash();
        if self.is_known_block(&hash) {
            return Err(RuleError::DuplicateBlock(hash).into());
        }
        self.check_block_in_isolation(&block)?;

        let parents = match self.admit_block(&block, flags)? {
            Admission::Ready(parents) => parents,
            Admission::Delay(process_time) => {
                debug!(%hash, process_time, "block delayed");
                self.delayed.add(block, process_time);
                return Ok(BlockOutcome::Delayed);
            }
            Admission::Orphan => {
                debug!(%hash, "block orphaned");
                self.orphans.add(block);
                return Ok(BlockOutcome::Orphan);
            }
        };

        if let Some(&invalid) = parents.iter().find(|&&p| self.index.status(p).is_invalid()) {
            let invalid_parent = self.index.hash(invalid);
            warn!(%hash, %invalid_parent, "block has an invalid parent");
            let ghostdag = self.ghostdag_manager().ghostdag(&parents)?;
            self.insert_block(block, parents, ghostdag, BlockStatus::InvalidAncestor)?;
            self.commit()?;
            return Err(RuleError::InvalidAncestor(invalid_parent).into());
        }

        match self.check_parents_relations(&parents) {
            Ok(()) => {}
            Err(ConsensusError::Rule(error)) => {
                warn!(%hash, %error, "block has a parent in the past of another parent");
                let ghostdag = self.ghostdag_manager().ghostdag(&self.independent_parents(&parents)?)?;
                self.insert_block(block, parents, ghostdag, BlockStatus::ValidateFailed)?;
                self.commit()?;
                return Err(error.into());
            }
            Err(err) => return Err(err),
        }
        let ghostdag = self.ghostdag_manager().ghostdag(&parents)?;
        match self.validate_block_in_context(&block, &ghostdag) {
            Ok(()) => {}
            Err(ConsensusError::Rule(error)) => {
                warn!(%hash, %error, "block failed contextual validation");
                self.insert_block(block, parents, ghostdag, BlockStatus::ValidateFailed)?;
                self.commit()?;
                return Err(error.into());
            }
            Err(err) => return Err(err),
        }

        let selected_parent =
            ghostdag.selected_parent.ok_or_else(|| ConsensusError::invariant("validated block without a selected parent"))?;
        let beats_tip = (ghostdag.blue_score, Reverse(hash)) > self.ghostdag_manager().selection_key(self.selected_tip());
        let status = match (self.is_violating_finality(selected_parent)?, beats_tip) {
            (true, true) => BlockStatus::ViolatedSubjectiveFinality,
            (true, false) => BlockStatus::UTXOPendingVerification,
            (false, _) => BlockStatus::DataStored,
        };
        let blue_score = ghostdag.blue_score;
        let id = self.insert_block(block, parents, ghostdag, status)?;

        let mut failure = None;
        match status {
            BlockStatus::ViolatedSubjectiveFinality => self.register_finality_conflict(id),
            BlockStatus::DataStored if beats_tip => match self.verify_chain(id)? {
                ChainVerification::Valid => {}
                ChainVerification::Failed { block, error } if block == id => {
                    self.index.set_status(id, BlockStatus::ValidateFailed);
                    failure = Some(error);
                }
                ChainVerification::Failed { .. } | ChainVerification::Disqualified => {
                    self.index.set_status(id, BlockStatus::DisqualifiedFromChain);
                }
            },
            BlockStatus::DataStored => self.index.set_status(id, BlockStatus::UTXONotVerified),
            _ => {}
        }

        self.resolve_virtual()?;
        self.commit()?;

        if let Some(error) = failure {
            return Err(error.into());
        }
        let status = self.index.status(id);
        debug!(%hash, blue_score, ?status, "accepted block");
        self.pending_events.push(ConsensusEvent::BlockAdded { hash, blue_score, status, was_unorphaned: flags.was_unorphaned });
        Ok(BlockOutcome::Accepted(status))
    }

    /// Processes every orphan that becomes complete once `parent` is in the
    /// DAG, transitively. Returns the accepted ones. Rule violations only
    /// reject the offending orphan; any other error aborts.
    fn process_orphans(&mut self, parent: Hash) -> ConsensusResult<Vec<Hash>> {
        let mut released = Vec::new();
        let mut queue = VecDeque::from([parent]);
        while let Some(current) = queue.pop_front() {
            let index = &self.index;
            let ready = self.orphans.take_unorphaned(&current, |h| index.contains(h));
            for orphan in ready {
                let hash = orphan.hash();
                let flags = BehaviorFlags { was_unorphaned: true, ..Default::default() };
                match self.process_single(orphan, flags) {
                    Ok(BlockOutcome::Accepted(_)) => {
                        released.push(hash);
                        queue.push_back(hash);
                    }
                    Ok(_) => {}
                    Err(err) if err.is_rule_error() => warn!(%hash, %err, "unorphaned block rejected"),
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(released)
    }

    /// Processes delayed blocks whose time has come, and the orphans they
    /// release
    fn process_delayed_blocks(&mut self) -> ConsensusResult<Vec<Hash>> {
        let mut released = Vec::new();
        while let Some(block) = self.delayed.pop_due(self.now_millis()) {
            let hash = block.hash();
            let flags = BehaviorFlags { after_delay: true, ..Default::default() };
            match self.process_single(block, flags) {
                Ok(BlockOutcome::Accepted(_)) => {
                    released.push(hash);
                    released.extend(self.process_orphans(hash)?);
                }
                Ok(_) => {}
                Err(err) if err.is_rule_error() => warn!(%hash, %err, "delayed block rejected"),
                Err(err) => return Err(err),
            }
        }
        Ok(released)
    }
}
