//! Blue block windows
//!
//! A window of a block is the most recent blues along its selected chain: its
//! own blues first, then its selected parent's, and so on down to genesis.
//! Short windows near genesis are padded with genesis itself.

use crate::consensus::context::DagContext;
use crate::consensus::dag::index::{BlockIndex, NodeId};
use crate::consensus::ghostdag::GhostdagData;

pub fn blue_window(index: &BlockIndex, genesis: NodeId, ghostdag: &GhostdagData, size: usize) -> Vec<NodeId> {
    let mut window = Vec::with_capacity(size);
    let mut current = ghostdag;
    'chain: loop {
        for &blue in &current.mergeset_blues {
            if window.len() == size {
                break 'chain;
            }
            window.push(blue);
        }
        match current.selected_parent {
            Some(sp) if window.len() < size => current = index.ghostdag(sp),
            _ => break,
        }
    }
    window.resize(size, genesis);
    window
}

impl DagContext {
    pub(crate) fn blue_window(&self, ghostdag: &GhostdagData, size: usize) -> Vec<NodeId> {
        blue_window(&self.index, self.genesis, ghostdag, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::dag::index::BlockNode;
    use crate::consensus::types::BlockStatus;
    use consensus_core::header::Header;
    use consensus_core::ZERO_HASH;

    fn add_chain_block(index: &mut BlockIndex, nonce: u64, sp: Option<NodeId>) -> NodeId {
        let parents: Vec<NodeId> = sp.into_iter().collect();
        let header = Header::new_finalized(1, index.hashes(parents.iter().copied()), ZERO_HASH, ZERO_HASH, ZERO_HASH, 0, 0x207fffff, nonce);
        let ghostdag = match sp {
            Some(sp) => GhostdagData { blue_score: index.blue_score(sp) + 1, ..GhostdagData::new_with_selected_parent(sp, 3) },
            None => GhostdagData::genesis(),
        };
        index.add(BlockNode::new(header, parents, ghostdag, BlockStatus::Valid, NodeId::new(0)))
    }

    #[test]
    fn test_window_walks_chain_and_pads() {
        let mut index = BlockIndex::new();
        let g = add_chain_block(&mut index, 0, None);
        let a = add_chain_block(&mut index, 1, Some(g));
        let b = add_chain_block(&mut index, 2, Some(a));
        let c = add_chain_block(&mut index, 3, Some(b));

        let window = blue_window(&index, g, index.ghostdag(c), 2);
        assert_eq!(window, vec![b, a]);
        // b's blues are [a], a's are [g], then padding with g
        let window = blue_window(&index, g, index.ghostdag(c), 5);
        assert_eq!(window, vec![b, a, g, g, g]);
        assert_eq!(blue_window(&index, g, &GhostdagData::genesis(), 3), vec![g, g, g]);
    }
}
