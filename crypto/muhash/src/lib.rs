//! Elliptic-curve multiset hash (ECMH) for UTXO set commitments
//!
//! Every element is mapped onto a secp256k1 point; the multiset is the sum of
//! its elements' points. Addition is commutative and removal is point
//! subtraction, so the accumulator can be updated incrementally in any order.

use jio_hashes::{Hash, ZERO_HASH};
use k256::elliptic_curve::group::Group;
use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::{AffinePoint, EncodedPoint, ProjectivePoint};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MultisetError {
    #[error("invalid multiset encoding: {0}")]
    InvalidEncoding(String),
}

/// Commutative accumulator over byte-string elements
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Multiset {
    point: ProjectivePoint,
}

impl Default for Multiset {
    fn default() -> Self {
        Self::new()
    }
}

impl Multiset {
    /// The empty multiset (the point at infinity)
    pub fn new() -> Self {
        Self { point: ProjectivePoint::IDENTITY }
    }

    pub fn is_empty(&self) -> bool {
        bool::from(self.point.is_identity())
    }

    pub fn add_element(&mut self, data: &[u8]) {
        self.point += hash_to_point(data);
    }

    pub fn remove_element(&mut self, data: &[u8]) {
        self.point -= hash_to_point(data);
    }

    /// Merges another multiset into this one
    pub fn combine(&mut self, other: &Multiset) {
        self.point += other.point;
    }

    /// Commitment hash. The empty multiset commits to the zero hash.
    pub fn finalize(&self) -> Hash {
        if self.is_empty() {
            return ZERO_HASH;
        }
        let encoded = self.point.to_affine().to_encoded_point(false);
        // Skip the SEC1 tag byte; commit to x || y
        Hash::from_bytes(Sha256::digest(&encoded.as_bytes()[1..]).into())
    }

    /// Compressed SEC1 bytes; the empty multiset serializes as an empty vector
    pub fn to_bytes(&self) -> Vec<u8> {
        if self.is_empty() {
            return Vec::new();
        }
        self.point.to_affine().to_encoded_point(true).as_bytes().to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MultisetError> {
        if bytes.is_empty() {
            return Ok(Self::new());
        }
        let encoded = EncodedPoint::from_bytes(bytes).map_err(|e| MultisetError::InvalidEncoding(e.to_string()))?;
        let affine: Option<AffinePoint> = AffinePoint::from_encoded_point(&encoded).into();
        let affine = affine.ok_or_else(|| MultisetError::InvalidEncoding("point not on curve".to_string()))?;
        Ok(Self { point: ProjectivePoint::from(affine) })
    }
}

/// Try-and-increment mapping: the first counter whose digest is a valid
/// x-coordinate yields the point with even y.
fn hash_to_point(data: &[u8]) -> ProjectivePoint {
    let mut counter: u64 = 0;
    loop {
        let digest = Sha256::new().chain_update(counter.to_le_bytes()).chain_update(data).finalize();
        let mut compressed = [0u8; 33];
        compressed[0] = 0x02;
        compressed[1..].copy_from_slice(&digest);
        if let Ok(encoded) = EncodedPoint::from_bytes(compressed) {
            let affine: Option<AffinePoint> = AffinePoint::from_encoded_point(&encoded).into();
            if let Some(affine) = affine {
                return ProjectivePoint::from(affine);
            }
        }
        counter += 1;
    }
}
