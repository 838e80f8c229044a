use crate::constants::TX_VERSION;
use crate::errors::{RuleError, RuleResult};
use crate::hashing::double_sha256;
use crate::subnets::SUBNETWORK_ID_COINBASE;
use crate::tx::{ScriptPublicKey, Transaction, TransactionOutput};
use crate::wire::{WireReader, WireSink};

/// Data a miner places in the coinbase payload: the blue score of the block,
/// the script that should receive this block's reward, and free-form extra data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoinbasePayload {
    pub blue_score: u64,
    pub script_public_key: ScriptPublicKey,
    pub extra_data: Vec<u8>,
}

impl CoinbasePayload {
    pub fn new(blue_score: u64, script_public_key: ScriptPublicKey, extra_data: Vec<u8>) -> Self {
        Self { blue_score, script_public_key, extra_data }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + 1 + self.script_public_key.len() + self.extra_data.len());
        buf.put_u64(self.blue_score);
        buf.put_var_bytes(self.script_public_key.script());
        buf.put(&self.extra_data);
        buf
    }

    pub fn deserialize(payload: &[u8]) -> RuleResult<Self> {
        let mut reader = WireReader::new(payload);
        let blue_score = reader.read_u64().map_err(|e| RuleError::BadCoinbasePayload(e.to_string()))?;
        let script = reader.read_var_bytes().map_err(|e| RuleError::BadCoinbasePayload(e.to_string()))?;
        let extra_data = reader.take(reader.remaining()).map_err(|e| RuleError::BadCoinbasePayload(e.to_string()))?.to_vec();
        Ok(Self { blue_score, script_public_key: ScriptPublicKey::new(script), extra_data })
    }
}

/// Builds a coinbase transaction carrying `payload` and paying `outputs`
pub fn build_coinbase_transaction(payload: &CoinbasePayload, outputs: Vec<TransactionOutput>) -> Transaction {
    let payload = payload.serialize();
    Transaction::new(TX_VERSION, vec![], outputs, 0, SUBNETWORK_ID_COINBASE, 0, double_sha256(&payload), payload)
}
