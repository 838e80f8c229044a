//! GHOSTDAG consensus implementation
//!
//! This module implements the GHOSTDAG protocol for BlockDAG consensus,
//! including blue set selection, parent ordering, and score calculation.

pub mod data;
pub mod protocol;

pub use data::{GhostdagData, GhostdagRecord};
pub use protocol::GhostdagManager;
