use std::collections::hash_map::{Entry, Iter};
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::tx::{Transaction, TransactionOutpoint, UtxoEntry};

/// Mapping outpoint to entry, keys unique, order irrelevant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoCollection {
    utxos: HashMap<TransactionOutpoint, UtxoEntry>,
}

impl UtxoCollection {
    pub fn new() -> Self {
        Self { utxos: HashMap::new() }
    }

    pub fn contains(&self, outpoint: &TransactionOutpoint) -> bool {
        self.utxos.contains_key(outpoint)
    }

    pub fn get(&self, outpoint: &TransactionOutpoint) -> Option<&UtxoEntry> {
        self.utxos.get(outpoint)
    }

    /// Insert a new UTXO entry (overwrites if exists)
    pub fn insert(&mut self, outpoint: TransactionOutpoint, entry: UtxoEntry) {
        self.utxos.insert(outpoint, entry);
    }

    pub fn remove(&mut self, outpoint: &TransactionOutpoint) -> Option<UtxoEntry> {
        self.utxos.remove(outpoint)
    }

    pub fn entry(&mut self, outpoint: TransactionOutpoint) -> Entry<'_, TransactionOutpoint, UtxoEntry> {
        self.utxos.entry(outpoint)
    }

    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, TransactionOutpoint, UtxoEntry> {
        self.utxos.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &TransactionOutpoint> {
        self.utxos.keys()
    }

    /// Spends the inputs and creates the outputs of `tx`. Returns false without
    /// mutating anything when an input is absent.
    pub fn add_tx(&mut self, tx: &Transaction, blue_score: u64) -> bool {
        if !tx.inputs.iter().all(|input| self.contains(&input.previous_outpoint)) {
            return false;
        }
        for input in &tx.inputs {
            self.remove(&input.previous_outpoint);
        }
        let is_coinbase = tx.is_coinbase();
        for (index, output) in tx.outputs.iter().enumerate() {
            let outpoint = TransactionOutpoint::new(tx.id(), index as u32);
            self.insert(outpoint, UtxoEntry::new(output.value, output.script_public_key.clone(), blue_score, is_coinbase));
        }
        true
    }
}

impl FromIterator<(TransactionOutpoint, UtxoEntry)> for UtxoCollection {
    fn from_iter<I: IntoIterator<Item = (TransactionOutpoint, UtxoEntry)>>(iter: I) -> Self {
        Self { utxos: iter.into_iter().collect() }
    }
}

impl IntoIterator for UtxoCollection {
    type Item = (TransactionOutpoint, UtxoEntry);
    type IntoIter = std::collections::hash_map::IntoIter<TransactionOutpoint, UtxoEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.utxos.into_iter()
    }
}

impl<'a> IntoIterator for &'a UtxoCollection {
    type Item = (&'a TransactionOutpoint, &'a UtxoEntry);
    type IntoIter = Iter<'a, TransactionOutpoint, UtxoEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.utxos.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subnets::SUBNETWORK_ID_NATIVE;
    use crate::tx::{ScriptPublicKey, TransactionInput, TransactionOutput};
    use crate::{Hash, ZERO_HASH};

    #[test]
    fn test_add_tx_requires_all_inputs() {
        let funding = TransactionOutpoint::new(Hash::from_le_u64([1, 0, 0, 0]), 0);
        let mut set = UtxoCollection::new();
        set.insert(funding, UtxoEntry::new(100, ScriptPublicKey::default(), 1, false));

        let spend = |outpoints: Vec<TransactionOutpoint>| {
            Transaction::new(
                0,
                outpoints.into_iter().map(|op| TransactionInput::new(op, vec![], 0, 0)).collect(),
                vec![TransactionOutput::new(90, ScriptPublicKey::default())],
                0,
                SUBNETWORK_ID_NATIVE,
                0,
                ZERO_HASH,
                vec![],
            )
        };

        let missing = TransactionOutpoint::new(Hash::from_le_u64([2, 0, 0, 0]), 0);
        assert!(!set.add_tx(&spend(vec![funding, missing]), 5));
        assert!(set.contains(&funding));

        let tx = spend(vec![funding]);
        assert!(set.add_tx(&tx, 5));
        assert!(!set.contains(&funding));
        let created = set.get(&TransactionOutpoint::new(tx.id(), 0)).unwrap();
        assert_eq!(created.block_blue_score, 5);
        assert_eq!(created.amount, 90);
    }
}
