pub mod block_store;
pub mod hash_keyed_store;
pub mod index_store;
pub mod metadata_store;
pub mod utxo_store;

pub use block_store::BlockStore;
pub use hash_keyed_store::HashKeyedStore;
pub use index_store::{block_index_key, BlockIndexStore};
pub use metadata_store::MetadataStore;
pub use utxo_store::UtxoStore;
