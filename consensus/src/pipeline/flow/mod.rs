//! Queues feeding the pipeline

pub mod process_queue;

pub use process_queue::DelayedBlocks;
