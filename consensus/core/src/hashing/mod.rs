//! Content hashing of headers and transactions over their canonical encoding

pub mod header;
pub mod tx;

pub use jio_hashes::{double_sha256, sha256, HashWriter};
