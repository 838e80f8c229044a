//! Reachability against brute-force ancestry on random DAGs

use super::index::{BlockIndex, BlockNode, NodeId};
use super::reachability::ReachabilityTree;
use crate::consensus::ghostdag::{GhostdagData, GhostdagManager};
use crate::consensus::types::BlockStatus;
use consensus_core::header::Header;
use consensus_core::ZERO_HASH;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

fn past_of(index: &BlockIndex, block: NodeId) -> HashSet<NodeId> {
    let mut past = HashSet::from([block]);
    let mut stack = vec![block];
    while let Some(current) = stack.pop() {
        for &parent in &index.node(current).parents {
            if past.insert(parent) {
                stack.push(parent);
            }
        }
    }
    past
}

#[test]
fn test_reachability_matches_brute_force_ancestry() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut index = BlockIndex::new();
    let header = Header::new_finalized(1, vec![], ZERO_HASH, ZERO_HASH, ZERO_HASH, 0, 0, 0);
    let genesis = index.add(BlockNode::new(header, vec![], GhostdagData::genesis(), BlockStatus::Valid, NodeId::new(0)));
    let mut reachability = ReachabilityTree::new();
    reachability.init_root(genesis);

    let mut tips = vec![genesis];
    let mut blocks = vec![genesis];
    for nonce in 1..300u64 {
        tips.shuffle(&mut rng);
        let count = rng.gen_range(1..=tips.len().min(4));
        let parents: Vec<NodeId> = tips[..count].to_vec();
        let data = GhostdagManager::new(5, &index, &reachability).ghostdag(&parents).unwrap();
        let mut parent_hashes = index.hashes(parents.iter().copied());
        parent_hashes.sort();
        let header = Header::new_finalized(1, parent_hashes, ZERO_HASH, ZERO_HASH, ZERO_HASH, 0, 0, nonce);
        let selected_parent = data.selected_parent.unwrap();
        let mergeset: Vec<NodeId> = data.mergeset_without_selected_parent().collect();
        let id = index.add(BlockNode::new(header, parents.clone(), data, BlockStatus::Valid, genesis));
        reachability.add_block(id, selected_parent, mergeset).unwrap();

        tips.retain(|t| !parents.contains(t));
        tips.push(id);
        // Occasionally keep an old block around as a tip to widen the DAG
        if rng.gen_bool(0.2) {
            tips.push(blocks[rng.gen_range(0..blocks.len())]);
            tips.sort();
            tips.dedup();
            let snapshot = tips.clone();
            tips.retain(|&t| !snapshot.iter().any(|&o| o != t && past_of(&index, o).contains(&t)));
        }
        blocks.push(id);
    }

    for &b in blocks.iter().step_by(7) {
        let past = past_of(&index, b);
        for &a in &blocks {
            assert_eq!(reachability.is_dag_ancestor_of(a, b).unwrap(), past.contains(&a), "ancestry of {a:?} and {b:?}");
        }
    }
}

#[test]
fn test_chain_ancestry_follows_selected_parents() {
    let mut index = BlockIndex::new();
    let header = Header::new_finalized(1, vec![], ZERO_HASH, ZERO_HASH, ZERO_HASH, 0, 0, 0);
    let genesis = index.add(BlockNode::new(header, vec![], GhostdagData::genesis(), BlockStatus::Valid, NodeId::new(0)));
    let mut reachability = ReachabilityTree::new();
    reachability.init_root(genesis);

    let add = |index: &mut BlockIndex, reachability: &mut ReachabilityTree, parents: Vec<NodeId>, nonce: u64| {
        let data = GhostdagManager::new(3, index, reachability).ghostdag(&parents).unwrap();
        let mut parent_hashes = index.hashes(parents.iter().copied());
        parent_hashes.sort();
        let header = Header::new_finalized(1, parent_hashes, ZERO_HASH, ZERO_HASH, ZERO_HASH, 0, 0, nonce);
        let selected_parent = data.selected_parent.unwrap();
        let mergeset: Vec<NodeId> = data.mergeset_without_selected_parent().collect();
        let id = index.add(BlockNode::new(header, parents, data, BlockStatus::Valid, genesis));
        reachability.add_block(id, selected_parent, mergeset).unwrap();
        id
    };

    let a = add(&mut index, &mut reachability, vec![genesis], 1);
    let b = add(&mut index, &mut reachability, vec![genesis], 2);
    let c = add(&mut index, &mut reachability, vec![a, b], 3);
    let sp = index.node(c).selected_parent().unwrap();
    let other = if sp == a { b } else { a };

    assert!(reachability.is_chain_ancestor_of(sp, c).unwrap());
    assert!(!reachability.is_chain_ancestor_of(other, c).unwrap());
    assert!(reachability.is_dag_ancestor_of(other, c).unwrap());
    assert!(reachability.is_dag_ancestor_of(c, c).unwrap());
    assert!(!reachability.is_dag_ancestor_of(c, a).unwrap());
}
