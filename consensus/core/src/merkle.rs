use crate::hashing::HashWriter;
use crate::tx::{Transaction, TransactionId};
use crate::wire::WireSink;
use crate::{Hash, ZERO_HASH};

/// Merkle root over the given leaves. Odd levels pair their last node with
/// itself; an empty leaf list has the zero hash as its root.
pub fn calc_merkle_root(hashes: impl IntoIterator<Item = Hash>) -> Hash {
    let mut level: Vec<Hash> = hashes.into_iter().collect();
    if level.is_empty() {
        return ZERO_HASH;
    }
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|chunk| {
                let left = chunk[0];
                let right = if chunk.len() == 2 { chunk[1] } else { left };
                hash_pair(&left, &right)
            })
            .collect();
    }
    level[0]
}

/// Root committed by `header.hash_merkle_root`: leaves are full transaction hashes in block order
pub fn calc_hash_merkle_root<'a>(txs: impl IntoIterator<Item = &'a Transaction>) -> Hash {
    calc_merkle_root(txs.into_iter().map(|tx| tx.hash()))
}

/// Root committed by `header.accepted_id_merkle_root`: leaves are accepted transaction IDs sorted ascending
pub fn calc_accepted_id_merkle_root(mut accepted_ids: Vec<TransactionId>) -> Hash {
    accepted_ids.sort();
    calc_merkle_root(accepted_ids)
}

fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = HashWriter::new();
    hasher.put_hash(left);
    hasher.put_hash(right);
    hasher.finalize_double()
}
