//! Block processing pipeline
//!
//! The stages are `impl DagContext` blocks: the header stage admits and
//! inserts blocks, the body stage verifies UTXO state, the virtual stage
//! picks the virtual's parents, and the block processor ties them together
//! with the orphan pool and the delayed queue.

pub mod block_processor;
pub mod body_processor;
pub mod deps_manager;
pub mod flow;
pub mod header_processor;
pub mod virtual_processor;

pub use deps_manager::OrphanPool;
pub use flow::DelayedBlocks;
