//! Orphan pool
//!
//! Blocks whose parents are not yet in the DAG wait here. The pool is bounded;
//! once full, the least recently added orphan is dropped.

use consensus_core::block::Block;
use consensus_core::Hash;
use lru::LruCache;
use std::num::NonZeroUsize;
use tracing::debug;

pub struct OrphanPool {
    orphans: LruCache<Hash, Block>,
}

impl OrphanPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { orphans: LruCache::new(capacity) }
    }

    pub fn add(&mut self, block: Block) {
        let hash = block.hash();
        if let Some((evicted, _)) = self.orphans.push(hash, block) {
            if evicted != hash {
                debug!(%evicted, "orphan pool full, dropped oldest orphan");
            }
        }
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.orphans.contains(hash)
    }

    pub fn remove(&mut self, hash: &Hash) -> Option<Block> {
        self.orphans.pop(hash)
    }

    pub fn len(&self) -> usize {
        self.orphans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orphans.is_empty()
    }

    /// Removes and returns the orphans that list `parent` and whose parents are
    /// now all known
    pub fn take_unorphaned(&mut self, parent: &Hash, is_known: impl Fn(&Hash) -> bool) -> Vec<Block> {
        let ready: Vec<Hash> = self
            .orphans
            .iter()
            .filter(|(_, block)| {
                let parents = block.header.direct_parents();
                parents.contains(parent) && parents.iter().all(&is_known)
            })
            .map(|(hash, _)| *hash)
            .collect();
        ready.iter().filter_map(|hash| self.orphans.pop(hash)).collect()
    }

    /// Parents that none of the orphans can provide and the DAG does not know
    pub fn missing_roots(&self, is_known: impl Fn(&Hash) -> bool) -> Vec<Hash> {
        let mut missing: Vec<Hash> = self
            .orphans
            .iter()
            .flat_map(|(_, block)| block.header.direct_parents().iter().copied())
            .filter(|parent| !is_known(parent) && !self.orphans.contains(parent))
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consensus_core::header::Header;
    use consensus_core::ZERO_HASH;

    fn block(nonce: u64, parents: Vec<Hash>) -> Block {
        Block::new(Header::new_finalized(1, parents, ZERO_HASH, ZERO_HASH, ZERO_HASH, 0, 0x207fffff, nonce), vec![])
    }

    #[test]
    fn test_take_unorphaned_requires_all_parents() {
        let mut pool = OrphanPool::new(10);
        let p1 = Hash::from_le_u64([1, 0, 0, 0]);
        let p2 = Hash::from_le_u64([2, 0, 0, 0]);
        let single = block(1, vec![p1]);
        let double = block(2, vec![p1, p2]);
        let (single_hash, double_hash) = (single.hash(), double.hash());
        pool.add(single);
        pool.add(double);
        assert_eq!(pool.missing_roots(|_| false), vec![p1, p2]);

        let released = pool.take_unorphaned(&p1, |h| *h == p1);
        assert_eq!(released.iter().map(|b| b.hash()).collect::<Vec<_>>(), vec![single_hash]);
        assert!(pool.contains(&double_hash));

        let released = pool.take_unorphaned(&p2, |h| *h == p1 || *h == p2);
        assert_eq!(released.len(), 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut pool = OrphanPool::new(2);
        let blocks: Vec<Block> = (0..3).map(|n| block(n, vec![Hash::from_le_u64([9, 0, 0, 0])])).collect();
        let hashes: Vec<Hash> = blocks.iter().map(|b| b.hash()).collect();
        for b in blocks {
            pool.add(b);
        }
        assert_eq!(pool.len(), 2);
        assert!(!pool.contains(&hashes[0]));
        assert!(pool.contains(&hashes[2]));
    }
}
