pub mod block_store;
pub mod cached_store;
pub mod consensus_db;
pub mod multiset_store;
pub mod utxo_diff_store;
pub mod utxo_set;

pub use block_store::BlockBodyStore;
pub use cached_store::CachedStore;
pub use consensus_db::{ConsensusStorage, DagState};
pub use multiset_store::MultisetStore;
pub use utxo_diff_store::{UtxoDiffRecord, UtxoDiffStore};
pub use utxo_set::FullUtxoSet;
