//! Queue of blocks whose timestamps are too far in the future
//!
//! Each block carries the local time (milliseconds) at which it may be
//! processed; the earliest one is served first.

use consensus_core::block::Block;
use consensus_core::Hash;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

#[derive(Default)]
pub struct DelayedBlocks {
    queue: BinaryHeap<Reverse<(i64, Hash)>>,
    blocks: HashMap<Hash, (i64, Block)>,
}

impl DelayedBlocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, block: Block, process_time: i64) {
        let hash = block.hash();
        if self.blocks.insert(hash, (process_time, block)).is_none() {
            self.queue.push(Reverse((process_time, hash)));
        }
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.blocks.contains_key(hash)
    }

    pub fn process_time(&self, hash: &Hash) -> Option<i64> {
        self.blocks.get(hash).map(|(time, _)| *time)
    }

    pub fn next_process_time(&self) -> Option<i64> {
        self.queue.peek().map(|Reverse((time, _))| *time)
    }

    /// Pops the earliest block whose process time is not after `now`
    pub fn pop_due(&mut self, now: i64) -> Option<Block> {
        match self.queue.peek() {
            Some(Reverse((time, _))) if *time <= now => {}
            _ => return None,
        }
        let Reverse((_, hash)) = self.queue.pop()?;
        self.blocks.remove(&hash).map(|(_, block)| block)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
