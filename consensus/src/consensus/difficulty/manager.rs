//! Difficulty adjustment
//!
//! The required target of a block is the average target of the difficulty
//! window of its selected parent, scaled by how long that window actually
//! took relative to the target block time.

use crate::consensus::context::DagContext;
use crate::consensus::dag::index::NodeId;
use consensus_core::config::params::Params;
use consensus_pow::{compact_to_target, target_to_compact};
use primitive_types::{U256, U512};

pub struct DifficultyManager {
    pow_max: U256,
    pow_max_bits: u32,
    window_size: usize,
    target_time_per_block: u64,
    disabled: bool,
}

impl DifficultyManager {
    pub fn new(params: &Params) -> Self {
        Self {
            pow_max: compact_to_target(params.pow_max_bits),
            pow_max_bits: params.pow_max_bits,
            window_size: params.difficulty_adjustment_window_size,
            target_time_per_block: params.target_time_per_block,
            disabled: params.disable_difficulty_adjustment,
        }
    }

    /// Blocks in a full window, the selected parent's own blues included
    pub fn full_window_size(&self) -> usize {
        self.window_size + 1
    }

    /// Whether a block whose selected parent has `blue_score` uses the maximal target
    pub fn uses_max_target(&self, blue_score: u64) -> bool {
        self.disabled || blue_score < self.full_window_size() as u64
    }

    pub fn pow_max_bits(&self) -> u32 {
        self.pow_max_bits
    }

    /// Required bits given the `(timestamp, bits)` of every window block
    pub fn calc_required_bits(&self, window: &[(i64, u32)]) -> u32 {
        if window.is_empty() {
            return self.pow_max_bits;
        }
        let (min_ts, max_ts) = window.iter().fold((i64::MAX, i64::MIN), |(lo, hi), &(ts, _)| (lo.min(ts), hi.max(ts)));
        let sum = window.iter().fold(U512::zero(), |acc, &(_, bits)| acc + U512::from(compact_to_target(bits)));
        let average = sum / U512::from(window.len() as u64);

        let actual_span = U512::from((max_ts - min_ts).max(0) as u64);
        let expected_span = U512::from(self.target_time_per_block.max(1)) * U512::from(self.window_size.max(1) as u64);
        let new_target = average * actual_span / expected_span;

        let new_target = if new_target > U512::from(self.pow_max) {
            self.pow_max
        } else {
            let mut bytes = [0u8; 64];
            new_target.to_little_endian(&mut bytes);
            U256::from_little_endian(&bytes[..32])
        };
        target_to_compact(new_target.max(U256::one()))
    }
}

impl DagContext {
    /// Bits a block with this selected parent must carry
    pub(crate) fn required_difficulty(&self, selected_parent: NodeId) -> u32 {
        if self.difficulty.uses_max_target(self.index.blue_score(selected_parent)) {
            return self.difficulty.pow_max_bits();
        }
        let window = self.blue_window(self.index.ghostdag(selected_parent), self.difficulty.full_window_size());
        let samples: Vec<(i64, u32)> = window.iter().map(|&b| (self.index.node(b).timestamp(), self.index.node(b).bits())).collect();
        self.difficulty.calc_required_bits(&samples)
    }
}
