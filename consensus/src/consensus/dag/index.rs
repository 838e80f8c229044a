//! Arena of block nodes
//!
//! Every block ever inserted lives here for the lifetime of the process and is
//! addressed by a [`NodeId`]. Parent and child links, GHOSTDAG sets and the
//! reachability tree all refer to nodes through these handles.

use crate::consensus::ghostdag::data::{GhostdagData, GhostdagRecord};
use crate::consensus::types::BlockStatus;
use crate::errors::{ConsensusError, ConsensusResult};
use consensus_core::header::Header;
use consensus_core::Hash;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Stable handle of a node inside [`BlockIndex`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Debug)]
pub struct BlockNode {
    pub hash: Hash,
    pub header: Header,
    pub parents: Vec<NodeId>,
    pub children: Vec<NodeId>,
    pub ghostdag: GhostdagData,
    pub status: BlockStatus,
    /// Advisory; set in the background once the node falls behind the finality point
    pub is_finalized: bool,
    /// The chain block at finality depth below this node; genesis points at itself
    pub finality_point: NodeId,
}

impl BlockNode {
    pub fn new(header: Header, parents: Vec<NodeId>, ghostdag: GhostdagData, status: BlockStatus, finality_point: NodeId) -> Self {
        Self { hash: header.hash, header, parents, children: Vec::new(), ghostdag, status, is_finalized: false, finality_point }
    }

    pub fn blue_score(&self) -> u64 {
        self.ghostdag.blue_score
    }

    pub fn selected_parent(&self) -> Option<NodeId> {
        self.ghostdag.selected_parent
    }

    pub fn timestamp(&self) -> i64 {
        self.header.timestamp
    }

    pub fn bits(&self) -> u32 {
        self.header.bits
    }
}

/// Persisted form of a [`BlockNode`]. Children are rebuilt on load.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockNodeRecord {
    pub header: Header,
    pub parents: Vec<Hash>,
    pub ghostdag: GhostdagRecord,
    pub status: BlockStatus,
    pub is_finalized: bool,
    pub finality_point: Hash,
}

#[derive(Default)]
pub struct BlockIndex {
    nodes: Vec<BlockNode>,
    by_hash: HashMap<Hash, NodeId>,
    dirty: HashSet<NodeId>,
}

impl BlockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.by_hash.contains_key(hash)
    }

    pub fn lookup(&self, hash: &Hash) -> Option<NodeId> {
        self.by_hash.get(hash).copied()
    }

    /// Like [`BlockIndex::lookup`] but fails with `UnknownBlock`
    pub fn get(&self, hash: &Hash) -> ConsensusResult<NodeId> {
        self.lookup(hash).ok_or(ConsensusError::UnknownBlock(*hash))
    }

    /// Resolves every hash or fails on the first unknown one
    pub fn lookup_many(&self, hashes: &[Hash]) -> ConsensusResult<Vec<NodeId>> {
        hashes.iter().map(|hash| self.get(hash)).collect()
    }

    pub fn node(&self, id: NodeId) -> &BlockNode {
        &self.nodes[id.index()]
    }

    /// Mutable access marks the node dirty
    pub fn node_mut(&mut self, id: NodeId) -> &mut BlockNode {
        self.dirty.insert(id);
        &mut self.nodes[id.index()]
    }

    pub fn hash(&self, id: NodeId) -> Hash {
        self.nodes[id.index()].hash
    }

    pub fn hashes(&self, ids: impl IntoIterator<Item = NodeId>) -> Vec<Hash> {
        ids.into_iter().map(|id| self.hash(id)).collect()
    }

    pub fn blue_score(&self, id: NodeId) -> u64 {
        self.nodes[id.index()].ghostdag.blue_score
    }

    pub fn ghostdag(&self, id: NodeId) -> &GhostdagData {
        &self.nodes[id.index()].ghostdag
    }

    pub fn status(&self, id: NodeId) -> BlockStatus {
        self.nodes[id.index()].status
    }

    pub fn set_status(&mut self, id: NodeId, status: BlockStatus) {
        let node = self.node_mut(id);
        node.status = status;
    }

    /// Inserts a node and links it as a child of its parents. Parents must already be present.
    pub fn add(&mut self, node: BlockNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.by_hash.insert(node.hash, id);
        for &parent in &node.parents {
            self.nodes[parent.index()].children.push(id);
        }
        self.nodes.push(node);
        self.dirty.insert(id);
        id
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &BlockNode)> {
        self.nodes.iter().enumerate().map(|(i, node)| (NodeId(i as u32), node))
    }

    pub fn dirty(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.dirty.iter().copied()
    }

    pub fn dirty_len(&self) -> usize {
        self.dirty.len()
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    pub fn to_record(&self, id: NodeId) -> BlockNodeRecord {
        let node = self.node(id);
        BlockNodeRecord {
            header: node.header.clone(),
            parents: self.hashes(node.parents.iter().copied()),
            ghostdag: node.ghostdag.to_record(self),
            status: node.status,
            is_finalized: node.is_finalized,
            finality_point: self.hash(node.finality_point),
        }
    }

    /// Re-inserts a persisted node. Records must arrive in blue-score order so
    /// that every referenced block is already present.
    pub fn add_record(&mut self, record: BlockNodeRecord) -> ConsensusResult<NodeId> {
        let parents = self.lookup_many(&record.parents).map_err(|e| ConsensusError::invariant(format!("loading block index: {e}")))?;
        let ghostdag = record.ghostdag.to_data(self)?;
        let own_id = NodeId(self.nodes.len() as u32);
        let finality_point = if record.finality_point == record.header.hash {
            own_id
        } else {
            self.lookup(&record.finality_point)
                .ok_or_else(|| ConsensusError::invariant(format!("unknown finality point {}", record.finality_point)))?
        };
        let status = match record.status {
            BlockStatus::DataStored => BlockStatus::UTXOPendingVerification,
            status => status,
        };
        let mut node = BlockNode::new(record.header, parents, ghostdag, status, finality_point);
        node.is_finalized = record.is_finalized;
        let id = self.add(node);
        if status != record.status {
            self.dirty.insert(id);
        } else {
            self.dirty.remove(&id);
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consensus_core::ZERO_HASH;

    fn header(n: u64, parents: Vec<Hash>) -> Header {
        Header::new_finalized(1, parents, ZERO_HASH, ZERO_HASH, ZERO_HASH, n as i64, 0x207fffff, n)
    }

    fn add(index: &mut BlockIndex, n: u64, parents: &[NodeId]) -> NodeId {
        let parent_hashes = index.hashes(parents.iter().copied());
        let ghostdag = match parents.first() {
            Some(&sp) => GhostdagData { blue_score: index.blue_score(sp) + 1, ..GhostdagData::new_with_selected_parent(sp, 3) },
            None => GhostdagData::genesis(),
        };
        index.add(BlockNode::new(header(n, parent_hashes), parents.to_vec(), ghostdag, BlockStatus::Valid, NodeId::new(0)))
    }

    #[test]
    fn test_add_links_children_and_marks_dirty() {
        let mut index = BlockIndex::new();
        let g = add(&mut index, 0, &[]);
        let a = add(&mut index, 1, &[g]);
        let b = add(&mut index, 2, &[g]);
        assert_eq!(index.node(g).children, vec![a, b]);
        assert_eq!(index.dirty_len(), 3);
        assert_eq!(index.lookup(&index.hash(b)), Some(b));

        index.clear_dirty();
        index.set_status(a, BlockStatus::DisqualifiedFromChain);
        assert_eq!(index.dirty().collect::<Vec<_>>(), vec![a]);
        assert_eq!(index.status(a), BlockStatus::DisqualifiedFromChain);
    }

    #[test]
    fn test_lookup_many_reports_unknown() {
        let mut index = BlockIndex::new();
        let g = add(&mut index, 0, &[]);
        let unknown = Hash::from_le_u64([9, 9, 9, 9]);
        assert_eq!(index.lookup_many(&[index.hash(g)]).unwrap(), vec![g]);
        assert!(matches!(index.lookup_many(&[index.hash(g), unknown]), Err(ConsensusError::UnknownBlock(h)) if h == unknown));
    }

    #[test]
    fn test_record_reload_rebuilds_children() {
        let mut index = BlockIndex::new();
        let g = add(&mut index, 0, &[]);
        let a = add(&mut index, 1, &[g]);
        index.set_status(a, BlockStatus::DataStored);
        let records = vec![index.to_record(g), index.to_record(a)];

        let mut reloaded = BlockIndex::new();
        for record in records {
            reloaded.add_record(record).unwrap();
        }
        let g2 = reloaded.get(&index.hash(g)).unwrap();
        let a2 = reloaded.get(&index.hash(a)).unwrap();
        assert_eq!(reloaded.node(g2).children, vec![a2]);
        assert_eq!(reloaded.node(g2).finality_point, g2);
        assert_eq!(reloaded.ghostdag(a2).selected_parent, Some(g2));
        // Interrupted writes never surface as DataStored
        assert_eq!(reloaded.status(a2), BlockStatus::UTXOPendingVerification);
        assert_eq!(reloaded.dirty().collect::<Vec<_>>(), vec![a2]);
    }
}
