//! UTXO algebra: collections, composable diffs and layered views

pub mod diff_view;
pub mod utxo_collection;
pub mod utxo_diff;
pub mod utxo_error;
pub mod utxo_view;

pub use diff_view::DiffUtxoView;
pub use utxo_collection::UtxoCollection;
pub use utxo_diff::{DiffEntry, UtxoDiff};
pub use utxo_error::{UtxoError, UtxoResult};
pub use utxo_view::UtxoView;
