use super::utxo_diff::UtxoDiff;
use super::utxo_error::UtxoResult;
use super::utxo_view::UtxoView;
use crate::tx::{Transaction, TransactionOutpoint, UtxoEntry};

/// A base view with a diff applied on top, without materializing the result
pub struct DiffUtxoView<'a, V: UtxoView + ?Sized> {
    base: &'a V,
    diff: UtxoDiff,
}

impl<'a, V: UtxoView + ?Sized> DiffUtxoView<'a, V> {
    pub fn new(base: &'a V, diff: UtxoDiff) -> Self {
        Self { base, diff }
    }

    pub fn base(&self) -> &'a V {
        self.base
    }

    pub fn diff(&self) -> &UtxoDiff {
        &self.diff
    }

    pub fn into_diff(self) -> UtxoDiff {
        self.diff
    }

    /// Applies `tx` as accepted at `blue_score`. Returns false without mutation
    /// when an input is absent or an output already exists.
    pub fn add_tx(&mut self, tx: &Transaction, blue_score: u64) -> UtxoResult<bool> {
        let mut spent = Vec::with_capacity(tx.inputs.len());
        for input in &tx.inputs {
            match self.get(&input.previous_outpoint)? {
                Some(entry) => spent.push(entry),
                None => return Ok(false),
            }
        }
        for index in 0..tx.outputs.len() {
            if self.get(&TransactionOutpoint::new(tx.id(), index as u32))?.is_some() {
                return Ok(false);
            }
        }
        self.diff.add_transaction(tx, &spent, blue_score)?;
        Ok(true)
    }

    /// Applies another diff on top of this view
    pub fn meld(&mut self, other: &UtxoDiff) -> UtxoResult<()> {
        self.diff.with_diff_in_place(other)
    }
}

impl<V: UtxoView + ?Sized> UtxoView for DiffUtxoView<'_, V> {
    /// `to_add` wins over `to_remove`, which makes a re-added entry with an
    /// updated blue score visible.
    fn get(&self, outpoint: &TransactionOutpoint) -> UtxoResult<Option<UtxoEntry>> {
        if let Some(entry) = self.diff.to_add.get(outpoint) {
            return Ok(Some(entry.clone()));
        }
        if self.diff.to_remove.contains(outpoint) {
            return Ok(None);
        }
        self.base.get(outpoint)
    }
}
