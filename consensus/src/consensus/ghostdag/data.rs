use crate::consensus::dag::index::{BlockIndex, NodeId};
use crate::errors::{ConsensusError, ConsensusResult};
use consensus_core::{Hash, KType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// GHOSTDAG classification of a block's merge set
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GhostdagData {
    /// `None` only for genesis
    pub selected_parent: Option<NodeId>,
    pub blue_score: u64,
    /// Blue merge-set members; the selected parent comes first
    pub mergeset_blues: Vec<NodeId>,
    pub mergeset_reds: Vec<NodeId>,
    /// Blue anticone sizes of blues whose size changed in this block's worldview
    pub blues_anticone_sizes: HashMap<NodeId, KType>,
}

impl GhostdagData {
    pub fn genesis() -> Self {
        Self::default()
    }

    pub fn new_with_selected_parent(selected_parent: NodeId, k: KType) -> Self {
        let mut mergeset_blues = Vec::with_capacity(k as usize + 1);
        let mut blues_anticone_sizes = HashMap::with_capacity(k as usize + 1);
        mergeset_blues.push(selected_parent);
        blues_anticone_sizes.insert(selected_parent, 0);
        Self { selected_parent: Some(selected_parent), blue_score: 0, mergeset_blues, mergeset_reds: Vec::new(), blues_anticone_sizes }
    }

    pub fn add_blue(&mut self, block: NodeId, blue_anticone_size: KType, affected: &HashMap<NodeId, KType>) {
        self.mergeset_blues.push(block);
        self.blues_anticone_sizes.insert(block, blue_anticone_size);
        for (&blue, &size) in affected {
            self.blues_anticone_sizes.insert(blue, size + 1);
        }
    }

    pub fn add_red(&mut self, block: NodeId) {
        self.mergeset_reds.push(block);
    }

    pub fn mergeset_size(&self) -> usize {
        self.mergeset_blues.len() + self.mergeset_reds.len()
    }

    /// Merge-set blocks other than the selected parent, blues first
    pub fn mergeset_without_selected_parent(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.mergeset_blues.iter().skip(usize::from(self.selected_parent.is_some())).chain(self.mergeset_reds.iter()).copied()
    }

    pub fn to_record(&self, index: &BlockIndex) -> GhostdagRecord {
        let mut blues_anticone_sizes: Vec<(Hash, KType)> =
            self.blues_anticone_sizes.iter().map(|(id, size)| (index.hash(*id), *size)).collect();
        blues_anticone_sizes.sort();
        GhostdagRecord {
            selected_parent: self.selected_parent.map(|id| index.hash(id)),
            blue_score: self.blue_score,
            mergeset_blues: self.mergeset_blues.iter().map(|id| index.hash(*id)).collect(),
            mergeset_reds: self.mergeset_reds.iter().map(|id| index.hash(*id)).collect(),
            blues_anticone_sizes,
        }
    }
}

/// Persisted form of [`GhostdagData`], keyed by hash instead of arena handle
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhostdagRecord {
    pub selected_parent: Option<Hash>,
    pub blue_score: u64,
    pub mergeset_blues: Vec<Hash>,
    pub mergeset_reds: Vec<Hash>,
    pub blues_anticone_sizes: Vec<(Hash, KType)>,
}

impl GhostdagRecord {
    /// Resolves hashes against an index that already holds every referenced block
    pub fn to_data(&self, index: &BlockIndex) -> ConsensusResult<GhostdagData> {
        let resolve = |hash: &Hash| {
            index.lookup(hash).ok_or_else(|| ConsensusError::invariant(format!("ghostdag data references unknown block {hash}")))
        };
        let selected_parent = self.selected_parent.as_ref().map(resolve).transpose()?;
        let mergeset_blues = self.mergeset_blues.iter().map(resolve).collect::<ConsensusResult<Vec<_>>>()?;
        let mergeset_reds = self.mergeset_reds.iter().map(resolve).collect::<ConsensusResult<Vec<_>>>()?;
        let blues_anticone_sizes =
            self.blues_anticone_sizes.iter().map(|(hash, size)| Ok((resolve(hash)?, *size))).collect::<ConsensusResult<_>>()?;
        Ok(GhostdagData { selected_parent, blue_score: self.blue_score, mergeset_blues, mergeset_reds, blues_anticone_sizes })
    }
}
