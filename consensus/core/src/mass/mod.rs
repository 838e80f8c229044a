use crate::config::params::Params;
use crate::tx::Transaction;

/// Computes transaction and block mass under the configured mass weights
#[derive(Debug, Clone, Copy)]
pub struct MassCalculator {
    mass_per_tx_byte: u64,
    mass_per_script_pub_key_byte: u64,
    mass_per_sig_op: u64,
}

impl MassCalculator {
    pub fn new(params: &Params) -> Self {
        Self {
            mass_per_tx_byte: params.mass_per_tx_byte,
            mass_per_script_pub_key_byte: params.mass_per_script_pub_key_byte,
            mass_per_sig_op: params.mass_per_sig_op,
        }
    }

    /// Serialized size, output script bytes and signature operations, each with its
    /// own weight. Coinbase transactions are charged for size only.
    pub fn calc_tx_mass(&self, tx: &Transaction) -> u64 {
        let size_mass = tx.serialized_size().saturating_mul(self.mass_per_tx_byte);
        if tx.is_coinbase() {
            return size_mass;
        }
        let script_bytes: u64 = tx.outputs.iter().map(|o| o.script_public_key.len() as u64).sum();
        let sig_ops: u64 = tx.inputs.iter().map(|i| i.sig_op_count as u64).sum();
        size_mass
            .saturating_add(script_bytes.saturating_mul(self.mass_per_script_pub_key_byte))
            .saturating_add(sig_ops.saturating_mul(self.mass_per_sig_op))
    }

    pub fn calc_block_mass<'a>(&self, txs: impl IntoIterator<Item = &'a Transaction>) -> u64 {
        txs.into_iter().fold(0u64, |acc, tx| acc.saturating_add(self.calc_tx_mass(tx)))
    }
}
