//! Script verification seam
//!
//! Consensus only needs to know whether an input unlocks the output it spends.
//! The bytecode interpreter lives behind [`ScriptVerifier`] so the engine can be
//! driven with any implementation.

use crate::tx::{Transaction, UtxoEntry};

pub trait ScriptVerifier: Send + Sync {
    /// Verifies input `input_index` of `tx` against the entry it spends
    fn verify_input(&self, tx: &Transaction, input_index: usize, entry: &UtxoEntry) -> Result<(), String>;
}

/// Treats scripts as opaque and only refuses to spend provably unspendable outputs
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardScriptVerifier;

impl ScriptVerifier for StandardScriptVerifier {
    fn verify_input(&self, _tx: &Transaction, _input_index: usize, entry: &UtxoEntry) -> Result<(), String> {
        if entry.script_public_key.is_provably_unspendable() {
            return Err("output script is provably unspendable".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::OP_RETURN;
    use crate::subnets::SUBNETWORK_ID_NATIVE;
    use crate::tx::ScriptPublicKey;
    use crate::ZERO_HASH;

    #[test]
    fn test_op_return_unspendable() {
        let tx = Transaction::new(0, vec![], vec![], 0, SUBNETWORK_ID_NATIVE, 0, ZERO_HASH, vec![]);
        let verifier = StandardScriptVerifier;
        let spendable = UtxoEntry::new(1, ScriptPublicKey::new(vec![0x51]), 0, false);
        let burned = UtxoEntry::new(1, ScriptPublicKey::new(vec![OP_RETURN, 1]), 0, false);
        assert!(verifier.verify_input(&tx, 0, &spendable).is_ok());
        assert!(verifier.verify_input(&tx, 0, &burned).is_err());
    }
}
