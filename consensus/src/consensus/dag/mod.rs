//! Block DAG structure
//!
//! The arena-backed block index and the reachability tree answering
//! ancestry queries in constant time.

pub mod index;
pub mod reachability;
#[cfg(test)]
mod integration_test;

pub use index::{BlockIndex, BlockNode, NodeId};
pub use reachability::{Interval, ReachabilityTree};
