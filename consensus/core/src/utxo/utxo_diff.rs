//! Composable UTXO diffs
//!
//! A diff is stored as two collections (`to_add`, `to_remove`) but every
//! operation reasons about a single outpoint at a time through [`DiffEntry`]:
//!
//! * only in `to_add`: the outpoint is absent from the base and created
//! * only in `to_remove`: the outpoint exists in the base and is spent
//! * in both: the base entry is replaced by a new one (e.g. a coinbase output
//!   whose accepting blue score changed during a reorg)
//!
//! All operations are defined without reading the base set; inputs that cannot
//! describe the same base are reported as [`UtxoError::ContradictoryDiff`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::utxo_collection::UtxoCollection;
use super::utxo_error::{UtxoError, UtxoResult};
use crate::tx::{Transaction, TransactionOutpoint, UtxoEntry};

/// Effect of a diff on a single outpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffEntry {
    Added(UtxoEntry),
    Removed(UtxoEntry),
    Updated { old: UtxoEntry, new: UtxoEntry },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoDiff {
    pub to_add: UtxoCollection,
    pub to_remove: UtxoCollection,
}

impl UtxoDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Number of outpoints this diff touches
    pub fn len(&self) -> usize {
        self.to_add.len() + self.to_remove.keys().filter(|op| !self.to_add.contains(op)).count()
    }

    pub fn entry(&self, outpoint: &TransactionOutpoint) -> Option<DiffEntry> {
        match (self.to_add.get(outpoint), self.to_remove.get(outpoint)) {
            (None, None) => None,
            (Some(added), None) => Some(DiffEntry::Added(added.clone())),
            (None, Some(removed)) => Some(DiffEntry::Removed(removed.clone())),
            (Some(added), Some(removed)) => Some(DiffEntry::Updated { old: removed.clone(), new: added.clone() }),
        }
    }

    fn set_entry(&mut self, outpoint: TransactionOutpoint, entry: Option<DiffEntry>) {
        self.to_add.remove(&outpoint);
        self.to_remove.remove(&outpoint);
        match entry {
            None => {}
            Some(DiffEntry::Added(e)) => self.to_add.insert(outpoint, e),
            Some(DiffEntry::Removed(e)) => self.to_remove.insert(outpoint, e),
            Some(DiffEntry::Updated { old, new }) => {
                self.to_remove.insert(outpoint, old);
                self.to_add.insert(outpoint, new);
            }
        }
    }

    fn outpoints(&self) -> impl Iterator<Item = &TransactionOutpoint> {
        self.to_add.keys().chain(self.to_remove.keys().filter(|op| !self.to_add.contains(op)))
    }

    /// The diff equivalent to applying `self` and then `other`, both expressed over the same base
    pub fn with_diff(&self, other: &UtxoDiff) -> UtxoResult<UtxoDiff> {
        let mut result = self.clone();
        result.with_diff_in_place(other)?;
        Ok(result)
    }

    /// In-place [`UtxoDiff::with_diff`]; work is proportional to the size of `other`.
    /// On error `self` may be partially updated.
    pub fn with_diff_in_place(&mut self, other: &UtxoDiff) -> UtxoResult<()> {
        for outpoint in other.outpoints() {
            let composed = compose(*outpoint, self.entry(outpoint), other.entry(outpoint))?;
            self.set_entry(*outpoint, composed);
        }
        Ok(())
    }

    /// The diff `d` such that `self.with_diff(&d) == other`
    pub fn diff_from(&self, other: &UtxoDiff) -> UtxoResult<UtxoDiff> {
        let mut result = UtxoDiff::new();
        let outpoints: HashSet<&TransactionOutpoint> = self.outpoints().chain(other.outpoints()).collect();
        for outpoint in outpoints {
            let entry = difference(*outpoint, self.entry(outpoint), other.entry(outpoint))?;
            result.set_entry(*outpoint, entry);
        }
        Ok(result)
    }

    /// Records creation of `entry` at `outpoint` on top of this diff
    pub fn add_entry(&mut self, outpoint: TransactionOutpoint, entry: UtxoEntry) -> UtxoResult<()> {
        let composed = compose(outpoint, self.entry(&outpoint), Some(DiffEntry::Added(entry)))?;
        self.set_entry(outpoint, composed);
        Ok(())
    }

    /// Records spending of `entry` at `outpoint` on top of this diff
    pub fn remove_entry(&mut self, outpoint: TransactionOutpoint, entry: UtxoEntry) -> UtxoResult<()> {
        let composed = compose(outpoint, self.entry(&outpoint), Some(DiffEntry::Removed(entry)))?;
        self.set_entry(outpoint, composed);
        Ok(())
    }

    /// Records the outputs of `tx`, accepted at `blue_score`, and the spending of `spent` entries
    pub fn add_transaction(&mut self, tx: &Transaction, spent: &[UtxoEntry], blue_score: u64) -> UtxoResult<()> {
        for (input, entry) in tx.inputs.iter().zip(spent) {
            self.remove_entry(input.previous_outpoint, entry.clone())?;
        }
        let is_coinbase = tx.is_coinbase();
        for (index, output) in tx.outputs.iter().enumerate() {
            let entry = UtxoEntry::new(output.value, output.script_public_key.clone(), blue_score, is_coinbase);
            self.add_entry(TransactionOutpoint::new(tx.id(), index as u32), entry)?;
        }
        Ok(())
    }
}

/// `b` applied after `a`, per outpoint
fn compose(outpoint: TransactionOutpoint, a: Option<DiffEntry>, b: Option<DiffEntry>) -> UtxoResult<Option<DiffEntry>> {
    use DiffEntry::*;
    let conflict = |reason| Err(UtxoError::ContradictoryDiff(outpoint, reason));
    match (a, b) {
        (None, b) => Ok(b),
        (a, None) => Ok(a),
        (Some(Added(_)), Some(Added(_))) => conflict("outpoint added twice"),
        (Some(Added(e1)), Some(Removed(e2))) => {
            if e1 == e2 {
                Ok(None)
            } else {
                conflict("removing an entry other than the one added")
            }
        }
        (Some(Added(e1)), Some(Updated { old, new })) => {
            if old == e1 {
                Ok(Some(Added(new)))
            } else {
                conflict("updating an entry other than the one added")
            }
        }
        (Some(Removed(e1)), Some(Added(e2))) => {
            if e1 == e2 {
                Ok(None)
            } else {
                Ok(Some(Updated { old: e1, new: e2 }))
            }
        }
        (Some(Removed(_)), Some(Removed(_))) => conflict("outpoint removed twice"),
        (Some(Removed(_)), Some(Updated { .. })) => conflict("updating a removed outpoint"),
        (Some(Updated { .. }), Some(Added(_))) => conflict("adding an outpoint that already exists"),
        (Some(Updated { old, new }), Some(Removed(e))) => {
            if e == new {
                Ok(Some(Removed(old)))
            } else {
                conflict("removing an entry other than the updated one")
            }
        }
        (Some(Updated { old, new }), Some(Updated { old: old2, new: new2 })) => {
            if old2 != new {
                conflict("updating from an entry other than the current one")
            } else if old == new2 {
                Ok(None)
            } else {
                Ok(Some(Updated { old, new: new2 }))
            }
        }
    }
}

/// The entry `d` with `compose(a, d) == b`, per outpoint
fn difference(outpoint: TransactionOutpoint, a: Option<DiffEntry>, b: Option<DiffEntry>) -> UtxoResult<Option<DiffEntry>> {
    use DiffEntry::*;
    let conflict = |reason| Err(UtxoError::ContradictoryDiff(outpoint, reason));
    match (a, b) {
        (None, b) => Ok(b),
        (Some(Added(e)), None) => Ok(Some(Removed(e))),
        (Some(Added(e1)), Some(Added(e2))) => {
            if e1 == e2 {
                Ok(None)
            } else {
                Ok(Some(Updated { old: e1, new: e2 }))
            }
        }
        (Some(Added(_)), Some(Removed(_) | Updated { .. })) => conflict("base both lacks and holds the outpoint"),
        (Some(Removed(e)), None) => Ok(Some(Added(e))),
        (Some(Removed(e1)), Some(Removed(e2))) => {
            if e1 == e2 {
                Ok(None)
            } else {
                conflict("diffs remove different base entries")
            }
        }
        (Some(Removed(_)), Some(Added(_))) => conflict("base both holds and lacks the outpoint"),
        (Some(Removed(e)), Some(Updated { old, new })) => {
            if e == old {
                Ok(Some(Added(new)))
            } else {
                conflict("diffs disagree on the base entry")
            }
        }
        (Some(Updated { old, new }), None) => {
            if new == old {
                Ok(None)
            } else {
                Ok(Some(Updated { old: new, new: old }))
            }
        }
        (Some(Updated { new, .. }), Some(Removed(_))) => Ok(Some(Removed(new))),
        (Some(Updated { new, .. }), Some(Updated { new: new2, .. })) => {
            if new == new2 {
                Ok(None)
            } else {
                Ok(Some(Updated { old: new, new: new2 }))
            }
        }
        (Some(Updated { .. }), Some(Added(_))) => conflict("base both holds and lacks the outpoint"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::ScriptPublicKey;
    use crate::Hash;

    fn op(n: u64) -> TransactionOutpoint {
        TransactionOutpoint::new(Hash::from_le_u64([n, 0, 0, 0]), 0)
    }

    fn entry(amount: u64, blue_score: u64) -> UtxoEntry {
        UtxoEntry::new(amount, ScriptPublicKey::new(vec![1, 2]), blue_score, false)
    }

    fn apply(base: &UtxoCollection, diff: &UtxoDiff) -> UtxoCollection {
        let mut out = base.clone();
        for (op, _) in diff.to_remove.iter() {
            out.remove(op);
        }
        for (op, e) in diff.to_add.iter() {
            out.insert(*op, e.clone());
        }
        out
    }

    #[test]
    fn test_add_then_remove_cancels() {
        let mut a = UtxoDiff::new();
        a.add_entry(op(1), entry(10, 1)).unwrap();
        let mut b = UtxoDiff::new();
        b.remove_entry(op(1), entry(10, 1)).unwrap();
        assert!(a.with_diff(&b).unwrap().is_empty());
    }

    #[test]
    fn test_remove_then_readd_with_new_blue_score_is_update() {
        let mut a = UtxoDiff::new();
        a.remove_entry(op(1), entry(10, 1)).unwrap();
        let mut b = UtxoDiff::new();
        b.add_entry(op(1), entry(10, 7)).unwrap();
        let composed = a.with_diff(&b).unwrap();
        assert_eq!(composed.entry(&op(1)), Some(DiffEntry::Updated { old: entry(10, 1), new: entry(10, 7) }));
    }

    #[test]
    fn test_contradictions() {
        let mut added = UtxoDiff::new();
        added.add_entry(op(1), entry(10, 1)).unwrap();
        assert!(matches!(added.with_diff(&added), Err(UtxoError::ContradictoryDiff(..))));

        let mut removed = UtxoDiff::new();
        removed.remove_entry(op(1), entry(10, 1)).unwrap();
        assert!(matches!(removed.with_diff(&removed), Err(UtxoError::ContradictoryDiff(..))));
        assert!(matches!(added.diff_from(&removed), Err(UtxoError::ContradictoryDiff(..))));
    }

    #[test]
    fn test_diff_from_inverts_with_diff() {
        let mut base = UtxoCollection::new();
        base.insert(op(1), entry(1, 1));
        base.insert(op(2), entry(2, 1));
        base.insert(op(3), entry(3, 1));

        let mut a = UtxoDiff::new();
        a.remove_entry(op(1), entry(1, 1)).unwrap();
        a.add_entry(op(4), entry(4, 2)).unwrap();
        a.remove_entry(op(3), entry(3, 1)).unwrap();
        a.add_entry(op(3), entry(3, 5)).unwrap();

        let mut b = UtxoDiff::new();
        b.remove_entry(op(2), entry(2, 1)).unwrap();
        b.add_entry(op(5), entry(5, 3)).unwrap();
        b.add_entry(op(4), entry(4, 9)).unwrap();

        let d = a.diff_from(&b).unwrap();
        assert_eq!(a.with_diff(&d).unwrap(), b);
        assert_eq!(apply(&apply(&base, &a), &d), apply(&base, &b));
    }

    #[test]
    fn test_with_diff_is_associative() {
        let mut a = UtxoDiff::new();
        a.add_entry(op(1), entry(1, 1)).unwrap();
        let mut b = UtxoDiff::new();
        b.remove_entry(op(1), entry(1, 1)).unwrap();
        b.add_entry(op(2), entry(2, 2)).unwrap();
        let mut c = UtxoDiff::new();
        c.remove_entry(op(2), entry(2, 2)).unwrap();
        c.add_entry(op(2), entry(2, 3)).unwrap();

        let left = a.with_diff(&b).unwrap().with_diff(&c).unwrap();
        let right = a.with_diff(&b.with_diff(&c).unwrap()).unwrap();
        assert_eq!(left, right);
        assert_eq!(left.entry(&op(2)), Some(DiffEntry::Added(entry(2, 3))));
        assert_eq!(left.entry(&op(1)), None);
    }

    #[test]
    fn test_len_counts_updates_once() {
        let mut d = UtxoDiff::new();
        d.remove_entry(op(1), entry(1, 1)).unwrap();
        d.add_entry(op(1), entry(1, 2)).unwrap();
        d.add_entry(op(2), entry(2, 2)).unwrap();
        assert_eq!(d.len(), 2);
    }
}
