use crate::header::Header;
use crate::wire::WireSink;
use crate::Hash;
use jio_hashes::HashWriter;

/// Writes every header field except the trailing nonce
pub fn write_prefix<S: WireSink>(sink: &mut S, header: &Header) {
    sink.put_i32(header.version);
    sink.put_var_int(header.parents.len() as u64);
    for parent in &header.parents {
        sink.put_hash(parent);
    }
    sink.put_hash(&header.hash_merkle_root);
    sink.put_hash(&header.accepted_id_merkle_root);
    sink.put_hash(&header.utxo_commitment);
    sink.put_i64(header.timestamp);
    sink.put_u32(header.bits);
}

pub fn write_header<S: WireSink>(sink: &mut S, header: &Header) {
    write_prefix(sink, header);
    sink.put_u64(header.nonce);
}

/// Double SHA-256 over the header encoding
pub fn hash(header: &Header) -> Hash {
    let mut hasher = HashWriter::new();
    write_header(&mut hasher, header);
    hasher.finalize_double()
}

/// Header hash with the nonce replaced, reusing a hasher that already holds the prefix
pub fn hash_with_nonce(prefix: &HashWriter, nonce: u64) -> Hash {
    let mut hasher = prefix.clone();
    hasher.put_u64(nonce);
    hasher.finalize_double()
}
