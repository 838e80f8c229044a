use super::utxo_collection::UtxoCollection;
use super::utxo_error::UtxoResult;
use crate::tx::{TransactionOutpoint, UtxoEntry};

/// Read access to a UTXO set as seen from some point of view. Reads may fault
/// from storage, hence the fallible signature.
pub trait UtxoView {
    fn get(&self, outpoint: &TransactionOutpoint) -> UtxoResult<Option<UtxoEntry>>;

    fn contains(&self, outpoint: &TransactionOutpoint) -> UtxoResult<bool> {
        Ok(self.get(outpoint)?.is_some())
    }
}

impl UtxoView for UtxoCollection {
    fn get(&self, outpoint: &TransactionOutpoint) -> UtxoResult<Option<UtxoEntry>> {
        Ok(UtxoCollection::get(self, outpoint).cloned())
    }
}

impl<V: UtxoView + ?Sized> UtxoView for &V {
    fn get(&self, outpoint: &TransactionOutpoint) -> UtxoResult<Option<UtxoEntry>> {
        (**self).get(outpoint)
    }
}
