//! RocksDB-backed persistence for the consensus engine
//!
//! Every accepted block is committed through a single [`DbBatch`] so that all
//! column families move forward together or not at all.

pub mod cache;
pub mod db;
pub mod errors;
pub mod stores;

pub use cache::MemSizeLruCache;
pub use db::{Database, DbBatch};
pub use errors::{DbError, DbResult};
