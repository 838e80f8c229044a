//! Context-free header checks
//!
//! Proof of work and the shape of the parent list. Nothing here needs the DAG,
//! so a failing header is rejected before the block touches any state.

use consensus_core::config::params::Params;
use consensus_core::errors::{RuleError, RuleResult};
use consensus_core::header::Header;
use consensus_pow::{check_proof_of_work, compact_to_target};
use primitive_types::U256;

pub struct HeaderValidator {
    pow_max: U256,
    max_block_parents: usize,
    max_timestamp_offset: i64,
    skip_proof_of_work: bool,
}

impl HeaderValidator {
    pub fn new(params: &Params) -> Self {
        Self {
            pow_max: compact_to_target(params.pow_max_bits),
            max_block_parents: params.max_block_parents,
            max_timestamp_offset: params.max_timestamp_offset(),
            skip_proof_of_work: params.skip_proof_of_work,
        }
    }

    pub fn validate_header_in_isolation(&self, header: &Header) -> RuleResult<()> {
        if !self.skip_proof_of_work {
            check_proof_of_work(header, self.pow_max)?;
        }
        self.check_parents(header)
    }

    fn check_parents(&self, header: &Header) -> RuleResult<()> {
        let parents = header.direct_parents();
        if parents.is_empty() {
            return Err(RuleError::NoParents);
        }
        if parents.len() > self.max_block_parents {
            return Err(RuleError::TooManyParents(parents.len(), self.max_block_parents));
        }
        if parents.windows(2).any(|w| w[0] >= w[1]) {
            return Err(RuleError::WrongParentsOrder);
        }
        Ok(())
    }

    /// Local time (milliseconds) at which a header stamped too far in the
    /// future may be processed, or `None` if it can be processed now
    pub fn delayed_process_time(&self, header: &Header, now: i64) -> Option<i64> {
        let max_allowed = now.saturating_add(self.max_timestamp_offset);
        (header.timestamp > max_allowed).then(|| header.timestamp - self.max_timestamp_offset)
    }
}
