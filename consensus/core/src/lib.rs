//! Core consensus types shared by the consensus engine, storage and the node
//!
//! This crate holds the wire-level data model (headers, transactions, blocks),
//! their canonical encoding and hashing, consensus parameters and genesis,
//! the rule-error taxonomy, mass and merkle helpers, and the UTXO algebra
//! (collections, diffs and layered views).

use std::collections::{HashMap, HashSet};

pub mod acceptance_data;
pub mod block;
pub mod coinbase;
pub mod config;
pub mod constants;
pub mod errors;
pub mod hashing;
pub mod header;
pub mod mass;
pub mod merkle;
pub mod network;
pub mod script;
pub mod subnets;
pub mod tx;
pub mod utxo;
pub mod wire;

pub use jio_hashes::{Hash, HASH_SIZE, ZERO_HASH};

/// GHOSTDAG cluster parameter and anticone-size counter type
pub type KType = u8;

pub type BlockHashSet = HashSet<Hash>;
pub type BlockHashMap<V> = HashMap<Hash, V>;
