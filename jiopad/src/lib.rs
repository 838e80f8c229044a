//! JIOPad - JIO block DAG node daemon
//!
//! Loads the node configuration, opens the consensus engine and feeds it
//! blocks: imported from a file, mined locally as a self-check, or released
//! from the delayed queue as the clock advances.

pub mod cli;
pub mod config;
pub mod node;

pub use cli::Args;
pub use config::Config;
pub use node::{ImportSummary, Node};

use consensus::ConsensusError;
use consensus_core::wire::WireError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Consensus(#[from] ConsensusError),

    #[error("line {line}: invalid hex: {source}")]
    Hex { line: usize, source: hex::FromHexError },

    #[error("line {line}: malformed block: {source}")]
    Wire { line: usize, source: WireError },

    #[error("self-check failed: {0}")]
    SelfCheck(String),
}

impl NodeError {
    /// Errors after which the node must not keep running
    pub fn is_fatal(&self) -> bool {
        match self {
            NodeError::Consensus(err) => err.is_fatal(),
            _ => true,
        }
    }
}
