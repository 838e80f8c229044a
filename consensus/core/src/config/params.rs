use serde::{Deserialize, Serialize};

use crate::network::NetworkType;
use crate::KType;

/// Consensus parameters. Every network shares the rules; only these values differ.
///
/// Durations are in milliseconds. Missing fields in a configuration file fall
/// back to the mainnet values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    pub net: NetworkType,
    /// GHOSTDAG cluster parameter
    pub ghostdag_k: KType,
    pub finality_duration: u64,
    pub target_time_per_block: u64,
    /// How many block intervals a timestamp may run ahead of the local clock
    pub timestamp_deviation_tolerance: u64,
    pub difficulty_adjustment_window_size: usize,
    /// Compact encoding of the easiest allowed target
    pub pow_max_bits: u32,
    pub base_subsidy: u64,
    pub subsidy_reduction_interval: u64,
    pub block_coinbase_maturity: u64,
    pub merge_set_size_limit: u64,
    pub max_block_parents: usize,
    pub max_mass_accepted_by_block: u64,
    pub mass_per_tx_byte: u64,
    pub mass_per_script_pub_key_byte: u64,
    pub mass_per_sig_op: u64,
    pub max_coinbase_payload_len: usize,
    pub genesis_timestamp: i64,
    pub genesis_nonce: u64,
    /// Accept any header hash. Test networks only.
    pub skip_proof_of_work: bool,
    /// Always require `pow_max_bits`
    pub disable_difficulty_adjustment: bool,
}

impl Default for Params {
    fn default() -> Self {
        Self::mainnet()
    }
}

impl Params {
    pub fn mainnet() -> Self {
        Self {
            net: NetworkType::Mainnet,
            ghostdag_k: 18,
            finality_duration: 24 * 60 * 60 * 1000,
            target_time_per_block: 1000,
            timestamp_deviation_tolerance: 132,
            difficulty_adjustment_window_size: 2641,
            pow_max_bits: 0x1e7fffff,
            base_subsidy: 50 * crate::constants::SOMPI_PER_COIN,
            subsidy_reduction_interval: 210_000,
            block_coinbase_maturity: 100,
            merge_set_size_limit: 1000,
            max_block_parents: 10,
            max_mass_accepted_by_block: 10_000_000,
            mass_per_tx_byte: 1,
            mass_per_script_pub_key_byte: 10,
            mass_per_sig_op: 10_000,
            max_coinbase_payload_len: 150,
            genesis_timestamp: 1_700_000_000_000,
            genesis_nonce: 0x3392c,
            skip_proof_of_work: false,
            disable_difficulty_adjustment: false,
        }
    }

    pub fn testnet() -> Self {
        Self { net: NetworkType::Testnet, pow_max_bits: 0x1f00ffff, genesis_nonce: 0x14582, ..Self::mainnet() }
    }

    pub fn devnet() -> Self {
        Self {
            net: NetworkType::Devnet,
            pow_max_bits: 0x207fffff,
            finality_duration: 60 * 60 * 1000,
            genesis_nonce: 0,
            ..Self::mainnet()
        }
    }

    pub fn simnet() -> Self {
        Self {
            net: NetworkType::Simnet,
            pow_max_bits: 0x207fffff,
            finality_duration: 60 * 60 * 1000,
            block_coinbase_maturity: 10,
            genesis_nonce: 0,
            skip_proof_of_work: true,
            disable_difficulty_adjustment: true,
            ..Self::mainnet()
        }
    }

    pub fn for_network(net: NetworkType) -> Self {
        match net {
            NetworkType::Mainnet => Self::mainnet(),
            NetworkType::Testnet => Self::testnet(),
            NetworkType::Devnet => Self::devnet(),
            NetworkType::Simnet => Self::simnet(),
        }
    }

    /// Number of blue-score units in one finality window
    pub fn finality_interval(&self) -> u64 {
        (self.finality_duration / self.target_time_per_block.max(1)).max(1)
    }

    /// Milliseconds a header timestamp may run ahead of the local clock before the block is delayed
    pub fn max_timestamp_offset(&self) -> i64 {
        (self.timestamp_deviation_tolerance * self.target_time_per_block) as i64
    }

    /// Size of the blue window whose median bounds new timestamps from below
    pub fn past_median_time_window_size(&self) -> usize {
        (2 * self.timestamp_deviation_tolerance).saturating_sub(1).max(1) as usize
    }

    /// Subsidy halves every `subsidy_reduction_interval` blue-score units
    pub fn calc_block_subsidy(&self, blue_score: u64) -> u64 {
        let halvings = blue_score / self.subsidy_reduction_interval.max(1);
        if halvings >= 64 {
            return 0;
        }
        self.base_subsidy >> halvings
    }
}
