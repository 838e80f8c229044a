use serde::{Deserialize, Serialize};

use crate::hashing;
use crate::wire::{WireReader, WireResult, WireSink};
use crate::Hash;

/// Block header. `hash` is a cache of the double SHA-256 over the remaining
/// fields and is refreshed by [`Header::finalize`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Cached hash
    pub hash: Hash,
    pub version: i32,
    /// Direct parents, sorted ascending by hash
    pub parents: Vec<Hash>,
    pub hash_merkle_root: Hash,
    pub accepted_id_merkle_root: Hash,
    pub utxo_commitment: Hash,
    /// Timestamp in milliseconds
    pub timestamp: i64,
    pub bits: u32,
    pub nonce: u64,
}

impl Header {
    #[allow(clippy::too_many_arguments)]
    pub fn new_finalized(
        version: i32,
        parents: Vec<Hash>,
        hash_merkle_root: Hash,
        accepted_id_merkle_root: Hash,
        utxo_commitment: Hash,
        timestamp: i64,
        bits: u32,
        nonce: u64,
    ) -> Self {
        let mut header = Self {
            hash: Default::default(),
            version,
            parents,
            hash_merkle_root,
            accepted_id_merkle_root,
            utxo_commitment,
            timestamp,
            bits,
            nonce,
        };
        header.finalize();
        header
    }

    /// Recompute and cache the header hash
    pub fn finalize(&mut self) {
        self.hash = hashing::header::hash(self);
    }

    pub fn direct_parents(&self) -> &[Hash] {
        &self.parents
    }

    pub fn is_genesis(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn encode_to<S: WireSink>(&self, sink: &mut S) {
        hashing::header::write_header(sink, self);
    }

    pub fn decode_from(reader: &mut WireReader) -> WireResult<Self> {
        let version = reader.read_i32()?;
        let parent_count = reader.read_count(32)?;
        let mut parents = Vec::with_capacity(parent_count);
        for _ in 0..parent_count {
            parents.push(reader.read_hash()?);
        }
        let hash_merkle_root = reader.read_hash()?;
        let accepted_id_merkle_root = reader.read_hash()?;
        let utxo_commitment = reader.read_hash()?;
        let timestamp = reader.read_i64()?;
        let bits = reader.read_u32()?;
        let nonce = reader.read_u64()?;
        Ok(Self::new_finalized(version, parents, hash_merkle_root, accepted_id_merkle_root, utxo_commitment, timestamp, bits, nonce))
    }
}
