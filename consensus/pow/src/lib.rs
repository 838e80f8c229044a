//! Proof of work: compact difficulty encoding and header hash checks
//!
//! The proof-of-work hash is the header hash read as a little-endian 256-bit
//! integer; it must not exceed the target encoded in `header.bits`.

use consensus_core::errors::{RuleError, RuleResult};
use consensus_core::hashing::header::{hash_with_nonce, write_prefix};
use consensus_core::header::Header;
use jio_hashes::HashWriter;
use primitive_types::U256;

/// Expands compact bits into a full target. A negative encoding yields zero and
/// an overflowing one yields `U256::MAX`; both are rejected by range checks.
pub fn compact_to_target(bits: u32) -> U256 {
    let exponent = bits >> 24;
    let mantissa = bits & 0x007f_ffff;
    if bits & 0x0080_0000 != 0 && mantissa != 0 {
        return U256::zero();
    }
    if exponent <= 3 {
        return U256::from(mantissa >> (8 * (3 - exponent)));
    }
    let shift = 8 * (exponent - 3) as usize;
    let target = U256::from(mantissa);
    if mantissa != 0 && target.bits() + shift > 256 {
        return U256::MAX;
    }
    target << shift
}

/// Compresses a target into compact bits, truncating to 23 bits of mantissa
pub fn target_to_compact(target: U256) -> u32 {
    let mut size = target.bits().div_ceil(8) as u32;
    let mut compact = if size <= 3 { (target.low_u64() << (8 * (3 - size))) as u32 } else { (target >> (8 * (size - 3) as usize)).low_u32() };
    if compact & 0x0080_0000 != 0 {
        compact >>= 8;
        size += 1;
    }
    compact | (size << 24)
}

/// State is an intermediate data structure with pre-computed values to speed up mining.
pub struct State {
    pub(crate) target: U256,
    // Every header field except the trailing nonce
    pub(crate) hasher: HashWriter,
}

impl State {
    #[inline]
    pub fn new(header: &Header) -> Self {
        let mut hasher = HashWriter::new();
        write_prefix(&mut hasher, header);
        Self { target: compact_to_target(header.bits), hasher }
    }

    #[inline]
    #[must_use]
    pub fn calculate_pow(&self, nonce: u64) -> U256 {
        let hash = hash_with_nonce(&self.hasher, nonce);
        U256::from_little_endian(hash.as_bytes())
    }

    #[inline]
    #[must_use]
    pub fn check_pow(&self, nonce: u64) -> (bool, U256) {
        let pow = self.calculate_pow(nonce);
        // The pow hash must be less or equal than the claimed target.
        (pow <= self.target, pow)
    }
}

/// Checks that `header.bits` encodes a target within `(0, pow_max]` and that the header hash meets it
pub fn check_proof_of_work(header: &Header, pow_max: U256) -> RuleResult<()> {
    let target = compact_to_target(header.bits);
    if target.is_zero() {
        return Err(RuleError::UnexpectedDifficulty { bits: header.bits, reason: "target is not positive".to_string() });
    }
    if target > pow_max {
        return Err(RuleError::UnexpectedDifficulty { bits: header.bits, reason: "target is above the network maximum".to_string() });
    }
    let pow = U256::from_little_endian(header.hash.as_bytes());
    if pow > target {
        return Err(RuleError::HighHash(header.hash));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use consensus_core::ZERO_HASH;

    #[test]
    fn test_compact_round_trip_of_canonical_bits() {
        for bits in [0x1d00ffffu32, 0x207fffff, 0x1e7fffff, 0x1b0404cb, 0x03123456] {
            assert_eq!(target_to_compact(compact_to_target(bits)), bits, "bits {bits:#x}");
        }
    }

    #[test]
    fn test_compact_edge_cases() {
        assert_eq!(compact_to_target(0x01003456), U256::zero());
        assert_eq!(compact_to_target(0x04923456), U256::zero());
        assert_eq!(compact_to_target(0xff123456), U256::MAX);
        assert_eq!(compact_to_target(0x1d00ffff), U256::from(0xffffu64) << 208);
    }

    #[test]
    fn test_state_matches_header_hash() {
        let header = Header::new_finalized(1, vec![], ZERO_HASH, ZERO_HASH, ZERO_HASH, 5, 0x207fffff, 17);
        let state = State::new(&header);
        assert_eq!(state.calculate_pow(17), U256::from_little_endian(header.hash.as_bytes()));
    }

    #[test]
    fn test_check_proof_of_work() {
        let pow_max = compact_to_target(0x207fffff);
        let mut header = Header::new_finalized(1, vec![], ZERO_HASH, ZERO_HASH, ZERO_HASH, 5, 0x207fffff, 0);
        let state = State::new(&header);
        let nonce = (0u64..).find(|n| state.check_pow(*n).0).unwrap();
        header.nonce = nonce;
        header.finalize();
        assert_eq!(check_proof_of_work(&header, pow_max), Ok(()));

        let bad_nonce = (0u64..).find(|n| !state.check_pow(*n).0).unwrap();
        header.nonce = bad_nonce;
        header.finalize();
        assert_eq!(check_proof_of_work(&header, pow_max), Err(RuleError::HighHash(header.hash)));

        header.bits = 0x217fffff;
        header.finalize();
        assert!(matches!(check_proof_of_work(&header, pow_max), Err(RuleError::UnexpectedDifficulty { .. })));
    }
}
