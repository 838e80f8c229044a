//!
//! # Transaction
//!
//! This module implements consensus [`Transaction`] structure and related types.
//!

mod script_public_key;

use jio_utils::hex::ToHex;
use jio_utils::mem_size::MemSizeEstimator;
pub use script_public_key::ScriptPublicKey;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::hashing;
use crate::subnets::{self, SubnetworkId, SUBNETWORK_ID_SIZE};
use crate::wire::{WireReader, WireResult, WireSink};
use crate::Hash;

/// COINBASE_TRANSACTION_INDEX is the index of the coinbase transaction in every block
pub const COINBASE_TRANSACTION_INDEX: usize = 0;

/// A 32-byte transaction identifier. Excludes signature scripts.
pub type TransactionId = crate::Hash;

pub type TransactionIndexType = u32;

/// Holds details about an individual transaction output in a utxo
/// set such as whether or not it was contained in a coinbase tx, the blue
/// score of the block that accepts the tx, its public key script, and how
/// much it pays.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UtxoEntry {
    pub amount: u64,
    pub script_public_key: ScriptPublicKey,
    pub block_blue_score: u64,
    pub is_coinbase: bool,
}

impl UtxoEntry {
    pub fn new(amount: u64, script_public_key: ScriptPublicKey, block_blue_score: u64, is_coinbase: bool) -> Self {
        Self { amount, script_public_key, block_blue_score, is_coinbase }
    }

    /// Canonical bytes of an (outpoint, entry) pair, the unit the UTXO multiset commits to
    pub fn commitment_bytes(&self, outpoint: &TransactionOutpoint) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64 + self.script_public_key.len());
        outpoint.encode_to(&mut buf);
        buf.put_u64(self.amount);
        buf.put_u64(self.block_blue_score);
        buf.put_u8(self.is_coinbase as u8);
        buf.put_var_bytes(self.script_public_key.script());
        buf
    }
}

impl MemSizeEstimator for UtxoEntry {
    fn estimate_mem_bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.script_public_key.len()
    }
}

/// Represents a transaction outpoint
#[derive(Eq, Default, Hash, PartialEq, Debug, Copy, Clone, Serialize, Deserialize, PartialOrd, Ord)]
pub struct TransactionOutpoint {
    pub transaction_id: TransactionId,
    pub index: TransactionIndexType,
}

impl TransactionOutpoint {
    pub fn new(transaction_id: TransactionId, index: u32) -> Self {
        Self { transaction_id, index }
    }

    pub fn encode_to<S: WireSink>(&self, sink: &mut S) {
        sink.put_hash(&self.transaction_id);
        sink.put_u32(self.index);
    }

    pub fn decode_from(reader: &mut WireReader) -> WireResult<Self> {
        Ok(Self { transaction_id: reader.read_hash()?, index: reader.read_u32()? })
    }
}

impl Display for TransactionOutpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.transaction_id, self.index)
    }
}

/// Represents a transaction input
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TransactionInput {
    pub previous_outpoint: TransactionOutpoint,
    pub signature_script: Vec<u8>,
    pub sequence: u64,
    pub sig_op_count: u8,
}

impl TransactionInput {
    pub fn new(previous_outpoint: TransactionOutpoint, signature_script: Vec<u8>, sequence: u64, sig_op_count: u8) -> Self {
        Self { previous_outpoint, signature_script, sequence, sig_op_count }
    }
}

impl std::fmt::Debug for TransactionInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionInput")
            .field("previous_outpoint", &self.previous_outpoint)
            .field("signature_script", &self.signature_script.to_hex())
            .field("sequence", &self.sequence)
            .field("sig_op_count", &self.sig_op_count)
            .finish()
    }
}

/// Represents a transaction output
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TransactionOutput {
    pub value: u64,
    pub script_public_key: ScriptPublicKey,
}

impl TransactionOutput {
    pub fn new(value: u64, script_public_key: ScriptPublicKey) -> Self {
        Self { value, script_public_key }
    }
}

/// Represents a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u16,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub lock_time: u64,
    pub subnetwork_id: SubnetworkId,
    pub gas: u64,
    pub payload_hash: Hash,
    pub payload: Vec<u8>,

    // Cached transaction ID. Always use self.id() instead of accessing this field directly
    id: TransactionId,
}

impl Transaction {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        version: u16,
        inputs: Vec<TransactionInput>,
        outputs: Vec<TransactionOutput>,
        lock_time: u64,
        subnetwork_id: SubnetworkId,
        gas: u64,
        payload_hash: Hash,
        payload: Vec<u8>,
    ) -> Self {
        let mut tx = Self { version, inputs, outputs, lock_time, subnetwork_id, gas, payload_hash, payload, id: Default::default() };
        tx.finalize();
        tx
    }

    /// Determines whether or not a transaction is a coinbase transaction. A coinbase
    /// transaction distributes subsidy and fees to the miners of the blue merge set
    /// and names the script public key that pays the current miner in future blocks.
    pub fn is_coinbase(&self) -> bool {
        self.subnetwork_id == subnets::SUBNETWORK_ID_COINBASE
    }

    /// Recompute and cache the tx id based on updated tx fields
    pub fn finalize(&mut self) {
        self.id = hashing::tx::id(self);
    }

    /// Returns the transaction ID
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Hash over the full encoding, signature scripts included
    pub fn hash(&self) -> Hash {
        hashing::tx::hash(self)
    }

    pub fn encode_to<S: WireSink>(&self, sink: &mut S, include_signature_scripts: bool) {
        sink.put_u16(self.version);
        sink.put_var_int(self.inputs.len() as u64);
        for input in &self.inputs {
            input.previous_outpoint.encode_to(sink);
            if include_signature_scripts {
                sink.put_var_bytes(&input.signature_script);
            } else {
                sink.put_var_int(0);
            }
            sink.put_u64(input.sequence);
            sink.put_u8(input.sig_op_count);
        }
        sink.put_var_int(self.outputs.len() as u64);
        for output in &self.outputs {
            sink.put_u64(output.value);
            sink.put_var_bytes(output.script_public_key.script());
        }
        sink.put_u64(self.lock_time);
        sink.put(self.subnetwork_id.as_bytes());
        sink.put_u64(self.gas);
        sink.put_hash(&self.payload_hash);
        sink.put_var_bytes(&self.payload);
    }

    pub fn decode_from(reader: &mut WireReader) -> WireResult<Self> {
        let version = reader.read_u16()?;
        let input_count = reader.read_count(32 + 4 + 1 + 8 + 1)?;
        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            let previous_outpoint = TransactionOutpoint::decode_from(reader)?;
            let signature_script = reader.read_var_bytes()?;
            let sequence = reader.read_u64()?;
            let sig_op_count = reader.read_u8()?;
            inputs.push(TransactionInput { previous_outpoint, signature_script, sequence, sig_op_count });
        }
        let output_count = reader.read_count(8 + 1)?;
        let mut outputs = Vec::with_capacity(output_count);
        for _ in 0..output_count {
            let value = reader.read_u64()?;
            let script_public_key = ScriptPublicKey::new(reader.read_var_bytes()?);
            outputs.push(TransactionOutput { value, script_public_key });
        }
        let lock_time = reader.read_u64()?;
        let mut subnetwork = [0u8; SUBNETWORK_ID_SIZE];
        subnetwork.copy_from_slice(reader.take(SUBNETWORK_ID_SIZE)?);
        let gas = reader.read_u64()?;
        let payload_hash = reader.read_hash()?;
        let payload = reader.read_var_bytes()?;
        Ok(Self::new(version, inputs, outputs, lock_time, SubnetworkId::from_bytes(subnetwork), gas, payload_hash, payload))
    }

    /// Size of the full wire encoding
    pub fn serialized_size(&self) -> u64 {
        let mut counter = crate::wire::SizeCounter::default();
        self.encode_to(&mut counter, true);
        counter.0 as u64
    }
}

impl MemSizeEstimator for Transaction {
    fn estimate_mem_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.payload.len()
            + self.inputs.iter().map(|i| i.signature_script.len() + std::mem::size_of::<TransactionInput>()).sum::<usize>()
            + self.outputs.iter().map(|o| o.script_public_key.len() + std::mem::size_of::<TransactionOutput>()).sum::<usize>()
    }
}
