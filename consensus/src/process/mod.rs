//! Consensus processes over the DAG context
//!
//! Merge-set acceptance, the expected coinbase, finality, past median time
//! and block building.

pub mod acceptance;
pub mod coinbase;
pub mod finality;
pub mod mining;
pub mod past_median_time;

#[cfg(test)]
mod integration_test;

pub use acceptance::AcceptanceOutcome;
pub use mining::MinerData;
