//! Consensus storage coordinator
//!
//! Groups every store the engine writes and commits them through one database
//! batch. Without a database the stores are plain in-memory maps and a commit
//! only clears the dirty sets.

use super::block_store::BlockBodyStore;
use super::cached_store::CachedStore;
use super::multiset_store::MultisetStore;
use super::utxo_diff_store::UtxoDiffStore;
use super::utxo_set::FullUtxoSet;
use crate::consensus::dag::index::{BlockIndex, BlockNodeRecord};
use crate::consensus::dag::reachability::{ReachabilityRecord, ReachabilityTree};
use crate::consensus::types::{ConsensusConfig, FinalityConflict};
use crate::errors::ConsensusResult;
use consensus_core::acceptance_data::MergeSetAcceptanceData;
use consensus_core::subnets::SubnetworkId;
use consensus_core::Hash;
use database::db::{CF_ACCEPTANCE, CF_REACHABILITY};
use database::stores::{BlockIndexStore, HashKeyedStore, MetadataStore};
use database::Database;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub const DAG_STATE_KEY: &str = "dag-state";

/// Single-row snapshot of the DAG's moving parts
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DagState {
    pub tip_hashes: Vec<Hash>,
    pub valid_tip_hashes: Vec<Hash>,
    /// The virtual's selected parent comes first
    pub virtual_parents_hashes: Vec<Hash>,
    #[serde(rename = "LocalSubnetworkID")]
    pub local_subnetwork_id: Option<SubnetworkId>,
    pub last_finality_point: Hash,
    pub diff_root_hashes: Vec<Hash>,
    #[serde(default)]
    pub finality_conflicts: Vec<FinalityConflict>,
}

struct Persistence {
    db: Arc<Database>,
    index: BlockIndexStore,
    reachability: HashKeyedStore<ReachabilityRecord>,
    metadata: MetadataStore,
}

pub struct ConsensusStorage {
    persistence: Option<Persistence>,
    pub utxo_set: FullUtxoSet,
    pub utxo_diffs: UtxoDiffStore,
    pub multisets: MultisetStore,
    pub acceptance: CachedStore<MergeSetAcceptanceData>,
    pub blocks: BlockBodyStore,
}

impl ConsensusStorage {
    pub fn in_memory() -> Self {
        Self {
            persistence: None,
            utxo_set: FullUtxoSet::in_memory(),
            utxo_diffs: UtxoDiffStore::in_memory(),
            multisets: MultisetStore::in_memory(),
            acceptance: CachedStore::in_memory(),
            blocks: BlockBodyStore::in_memory(),
        }
    }

    pub fn with_db(db: Arc<Database>, config: &ConsensusConfig) -> Self {
        Self {
            utxo_set: FullUtxoSet::with_db(db.clone(), config.utxo_cache_max_bytes),
            utxo_diffs: UtxoDiffStore::with_db(db.clone()),
            multisets: MultisetStore::with_db(db.clone()),
            acceptance: CachedStore::with_db(db.clone(), CF_ACCEPTANCE),
            blocks: BlockBodyStore::with_db(db.clone(), config.block_body_cache_capacity),
            persistence: Some(Persistence {
                index: BlockIndexStore::new(db.clone()),
                reachability: HashKeyedStore::new(db.clone(), CF_REACHABILITY),
                metadata: MetadataStore::new(db.clone()),
                db,
            }),
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.persistence.is_some()
    }

    pub fn load_dag_state(&self) -> ConsensusResult<Option<DagState>> {
        match &self.persistence {
            Some(p) => Ok(p.metadata.get_json(DAG_STATE_KEY)?),
            None => Ok(None),
        }
    }

    /// Block index records in ascending blue-score order
    pub fn load_block_index(&self) -> ConsensusResult<Vec<BlockNodeRecord>> {
        match &self.persistence {
            Some(p) => Ok(p.index.load_all::<BlockNodeRecord>()?.into_iter().map(|(_, _, record)| record).collect()),
            None => Ok(Vec::new()),
        }
    }

    pub fn load_reachability(&self) -> ConsensusResult<Vec<(Hash, ReachabilityRecord)>> {
        match &self.persistence {
            Some(p) => Ok(p.reachability.load_all()?),
            None => Ok(Vec::new()),
        }
    }

    /// Writes every dirty record in one batch. Dirty sets are left untouched so
    /// that a failed write is retried by the next commit; the caller clears
    /// them on success.
    pub fn commit(&self, index: &BlockIndex, reachability: &ReachabilityTree, state: &DagState) -> ConsensusResult<()> {
        let Some(p) = &self.persistence else { return Ok(()) };
        let mut batch = p.db.batch();
        for id in index.dirty() {
            let node = index.node(id);
            p.index.put(&mut batch, node.blue_score(), &node.hash, &index.to_record(id))?;
        }
        for id in reachability.dirty() {
            p.reachability.put(&mut batch, &index.hash(id), &reachability.to_record(id, index)?)?;
        }
        self.blocks.stage(&mut batch)?;
        self.utxo_set.stage(&mut batch)?;
        self.utxo_diffs.stage(&mut batch)?;
        self.multisets.stage(&mut batch)?;
        self.acceptance.stage(&mut batch)?;
        p.metadata.put_json(&mut batch, DAG_STATE_KEY, state)?;
        let ops = batch.len();
        p.db.write_batch(batch)?;
        debug!(ops, "committed consensus state");
        Ok(())
    }

    pub fn clear_dirty(&mut self) {
        self.blocks.clear_pending();
        self.utxo_set.clear_pending();
        self.utxo_diffs.clear_dirty();
        self.multisets.clear_dirty();
        self.acceptance.clear_dirty();
    }
}
