//! Per-block UTXO diffs chained through diff children
//!
//! The diff stored for block `N` turns the UTXO set of its diff child into the
//! UTXO set of `N`. Blocks without a diff child are roots; their diffs are
//! expressed against the virtual's full UTXO set. Restoring a block walks its
//! diff-child links up to a root and composes the diffs on the way back down.

use super::cached_store::CachedStore;
use crate::errors::{ConsensusError, ConsensusResult};
use consensus_core::utxo::UtxoDiff;
use consensus_core::Hash;
use database::db::CF_UTXO_DIFFS;
use database::{Database, DbBatch, DbResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::trace;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoDiffRecord {
    pub diff: UtxoDiff,
    pub diff_child: Option<Hash>,
}

pub struct UtxoDiffStore {
    records: CachedStore<UtxoDiffRecord>,
    roots: HashSet<Hash>,
}

impl UtxoDiffStore {
    pub fn in_memory() -> Self {
        Self { records: CachedStore::in_memory(), roots: HashSet::new() }
    }

    pub fn with_db(db: Arc<Database>) -> Self {
        Self { records: CachedStore::with_db(db, CF_UTXO_DIFFS), roots: HashSet::new() }
    }

    /// Restores the root set persisted with the DAG state
    pub fn set_roots(&mut self, roots: impl IntoIterator<Item = Hash>) {
        self.roots = roots.into_iter().collect();
    }

    pub fn roots(&self) -> impl Iterator<Item = &Hash> {
        self.roots.iter()
    }

    pub fn is_root(&self, hash: &Hash) -> bool {
        self.roots.contains(hash)
    }

    pub fn has_diff(&self, hash: &Hash) -> ConsensusResult<bool> {
        self.records.contains(hash)
    }

    fn record(&self, hash: &Hash) -> ConsensusResult<UtxoDiffRecord> {
        match self.records.get(hash)? {
            Some(record) => Ok(record.into_owned()),
            None => Err(ConsensusError::invariant(format!("missing utxo diff of block {hash}"))),
        }
    }

    /// Registers a root whose diff is already relative to the full set. Used for genesis.
    pub fn insert_root(&mut self, hash: Hash, diff: UtxoDiff) {
        self.records.insert(hash, UtxoDiffRecord { diff, diff_child: None });
        self.roots.insert(hash);
    }

    /// Stores `diff` (full set to the UTXO set of `block`) and makes `block` the
    /// diff child of every parent that is still a root.
    pub fn attach(&mut self, block: Hash, diff: UtxoDiff, parents: &[Hash]) -> ConsensusResult<()> {
        for parent in parents {
            if !self.roots.contains(parent) {
                continue;
            }
            let record = self.record(parent)?;
            let relative = diff.diff_from(&record.diff)?;
            self.records.insert(*parent, UtxoDiffRecord { diff: relative, diff_child: Some(block) });
            self.roots.remove(parent);
        }
        self.insert_root(block, diff);
        trace!(%block, roots = self.roots.len(), "attached utxo diff");
        Ok(())
    }

    /// Re-expresses every root against the full set after `virtual_diff` is melded into it
    pub fn apply_virtual_diff(&mut self, virtual_diff: &UtxoDiff) -> ConsensusResult<()> {
        if virtual_diff.is_empty() {
            return Ok(());
        }
        let roots: Vec<Hash> = self.roots.iter().copied().collect();
        for root in roots {
            let record = self.record(&root)?;
            let diff = virtual_diff.diff_from(&record.diff)?;
            self.records.insert(root, UtxoDiffRecord { diff, diff_child: None });
        }
        Ok(())
    }

    /// Diff turning the full set into the UTXO set of `block`
    pub fn restore(&self, block: &Hash) -> ConsensusResult<UtxoDiff> {
        let mut stack = Vec::new();
        let mut current = *block;
        let mut record = self.record(&current)?;
        while let Some(child) = record.diff_child {
            stack.push(record.diff);
            current = child;
            record = self.record(&current)?;
        }
        let mut accumulated = record.diff;
        while let Some(diff) = stack.pop() {
            accumulated.with_diff_in_place(&diff)?;
        }
        Ok(accumulated)
    }

    /// Drops a non-root diff from memory; it is re-read on demand
    pub fn evict(&mut self, hash: &Hash) -> bool {
        !self.roots.contains(hash) && self.records.evict(hash)
    }

    /// Permanently deletes a non-root diff
    pub fn delete(&mut self, hash: &Hash) {
        if !self.roots.contains(hash) {
            self.records.delete(hash);
        }
    }

    /// Deletes root `hash`. Each of `parents` whose diff child it was becomes
    /// a root re-expressed against the full set; those are returned.
    pub fn drop_root(&mut self, hash: &Hash, parents: &[Hash]) -> ConsensusResult<Vec<Hash>> {
        if !self.roots.contains(hash) {
            return Ok(Vec::new());
        }
        let root = self.record(hash)?;
        let mut promoted = Vec::new();
        for parent in parents {
            let Some(record) = self.records.get(parent)?.map(|r| r.into_owned()) else { continue };
            if record.diff_child != Some(*hash) {
                continue;
            }
            let diff = root.diff.with_diff(&record.diff)?;
            self.records.insert(*parent, UtxoDiffRecord { diff, diff_child: None });
            self.roots.insert(*parent);
            promoted.push(*parent);
        }
        self.roots.remove(hash);
        self.records.delete(hash);
        trace!(%hash, promoted = promoted.len(), "dropped utxo diff root");
        Ok(promoted)
    }

    pub fn cached_hashes(&self) -> Vec<Hash> {
        self.records.cached_keys().copied().collect()
    }

    pub fn stage(&self, batch: &mut DbBatch) -> DbResult<()> {
        self.records.stage(batch)
    }

    pub fn clear_dirty(&mut self) {
        self.records.clear_dirty();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consensus_core::tx::{ScriptPublicKey, TransactionOutpoint, UtxoEntry};
    use consensus_core::utxo::{UtxoCollection, UtxoView};

    fn h(n: u64) -> Hash {
        Hash::from_le_u64([n, 0, 0, 0])
    }

    fn op(n: u64) -> TransactionOutpoint {
        TransactionOutpoint::new(h(n), 0)
    }

    fn entry(amount: u64) -> UtxoEntry {
        UtxoEntry::new(amount, ScriptPublicKey::new(vec![0x51]), 0, false)
    }

    fn set(items: &[u64]) -> UtxoCollection {
        items.iter().map(|&n| (op(n), entry(n))).collect()
    }

    /// Diff turning `from` into `to`
    fn diff_between(from: &UtxoCollection, to: &UtxoCollection) -> UtxoDiff {
        let mut diff = UtxoDiff::new();
        for (outpoint, e) in from.iter() {
            if !to.contains(outpoint) {
                diff.remove_entry(*outpoint, e.clone()).unwrap();
            }
        }
        for (outpoint, e) in to.iter() {
            if !from.contains(outpoint) {
                diff.add_entry(*outpoint, e.clone()).unwrap();
            }
        }
        diff
    }

    fn apply(base: &UtxoCollection, diff: &UtxoDiff) -> UtxoCollection {
        let mut out = base.clone();
        for (outpoint, _) in diff.to_remove.iter() {
            out.remove(outpoint);
        }
        for (outpoint, e) in diff.to_add.iter() {
            out.insert(*outpoint, e.clone());
        }
        out
    }

    #[test]
    fn test_restore_through_diff_children() {
        let full = set(&[1, 2, 3]);
        let a = set(&[1]);
        let b = set(&[1, 2]);
        let c = set(&[2, 3]);

        let mut store = UtxoDiffStore::in_memory();
        store.insert_root(h(10), diff_between(&full, &a));
        store.attach(h(11), diff_between(&full, &b), &[h(10)]).unwrap();
        store.attach(h(12), diff_between(&full, &c), &[h(11)]).unwrap();

        assert_eq!(store.roots().collect::<Vec<_>>(), vec![&h(12)]);
        assert_eq!(apply(&full, &store.restore(&h(10)).unwrap()), a);
        assert_eq!(apply(&full, &store.restore(&h(11)).unwrap()), b);
        assert_eq!(apply(&full, &store.restore(&h(12)).unwrap()), c);
    }

    #[test]
    fn test_virtual_change_keeps_restorations() {
        let full = set(&[1, 2]);
        let a = set(&[1]);
        let b = set(&[2, 5]);
        let mut store = UtxoDiffStore::in_memory();
        store.insert_root(h(10), diff_between(&full, &a));
        store.attach(h(11), diff_between(&full, &b), &[h(10)]).unwrap();

        // The virtual moves to the UTXO set of block 11
        let virtual_diff = store.restore(&h(11)).unwrap();
        store.apply_virtual_diff(&virtual_diff).unwrap();
        let new_full = apply(&full, &virtual_diff);
        assert_eq!(new_full, b);
        assert!(store.restore(&h(11)).unwrap().is_empty());
        assert_eq!(apply(&new_full, &store.restore(&h(10)).unwrap()), a);
        let view_entry = consensus_core::utxo::DiffUtxoView::new(&new_full, store.restore(&h(10)).unwrap()).get(&op(1)).unwrap();
        assert_eq!(view_entry, Some(entry(1)));
    }

    #[test]
    fn test_missing_diff_is_fatal() {
        let store = UtxoDiffStore::in_memory();
        assert!(store.restore(&h(1)).unwrap_err().is_fatal());
    }

    #[test]
    fn test_dropped_root_promotes_its_parents() {
        let full = set(&[1, 2, 3]);
        let a = set(&[1]);
        let b = set(&[1, 4]);
        let c = set(&[3]);

        let mut store = UtxoDiffStore::in_memory();
        store.insert_root(h(10), diff_between(&full, &a));
        store.attach(h(11), diff_between(&full, &b), &[h(10)]).unwrap();
        store.attach(h(12), diff_between(&full, &c), &[h(11)]).unwrap();

        assert_eq!(store.drop_root(&h(12), &[h(11)]).unwrap(), vec![h(11)]);
        assert!(!store.has_diff(&h(12)).unwrap());
        assert!(store.is_root(&h(11)) && !store.is_root(&h(12)));
        assert_eq!(apply(&full, &store.restore(&h(11)).unwrap()), b);
        assert_eq!(apply(&full, &store.restore(&h(10)).unwrap()), a);

        // Non-roots are left alone
        assert!(store.drop_root(&h(10), &[]).unwrap().is_empty());
        assert!(store.has_diff(&h(10)).unwrap());
    }

    #[test]
    fn test_roots_are_never_evicted() {
        let tmp = tempfile::TempDir::new().unwrap();
        let db = Arc::new(Database::open(tmp.path()).unwrap());
        let mut store = UtxoDiffStore::with_db(db.clone());
        store.insert_root(h(1), UtxoDiff::new());
        store.attach(h(2), UtxoDiff::new(), &[h(1)]).unwrap();
        let mut batch = db.batch();
        store.stage(&mut batch).unwrap();
        db.write_batch(batch).unwrap();
        store.clear_dirty();

        assert!(!store.evict(&h(2)));
        assert!(store.evict(&h(1)));
        assert_eq!(store.restore(&h(1)).unwrap(), UtxoDiff::new());
    }
}
