use crate::tx::{Transaction, TransactionId};
use crate::Hash;
use jio_hashes::HashWriter;

/// Transaction ID: double SHA-256 over the encoding with signature scripts blanked
pub fn id(tx: &Transaction) -> TransactionId {
    let mut hasher = HashWriter::new();
    tx.encode_to(&mut hasher, false);
    hasher.finalize_double()
}

/// Transaction hash: double SHA-256 over the full encoding
pub fn hash(tx: &Transaction) -> Hash {
    let mut hasher = HashWriter::new();
    tx.encode_to(&mut hasher, true);
    hasher.finalize_double()
}
