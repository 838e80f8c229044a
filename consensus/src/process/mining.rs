//! Block building
//!
//! Produces a block that is valid on top of the given parents (the virtual's
//! parents by default): coinbase paying the merge set, accepted-id merkle
//! root and UTXO commitment computed from the would-be UTXO state, required
//! difficulty and a solved nonce.

use crate::consensus::context::DagContext;
use crate::errors::{ConsensusError, ConsensusResult};
use consensus_core::block::Block;
use consensus_core::coinbase::CoinbasePayload;
use consensus_core::constants::BLOCK_VERSION;
use consensus_core::errors::RuleError;
use consensus_core::header::Header;
use consensus_core::merkle::{calc_accepted_id_merkle_root, calc_hash_merkle_root};
use consensus_core::tx::{ScriptPublicKey, Transaction};
use consensus_core::Hash;
use consensus_pow::State as PowState;
use tracing::debug;

/// Who gets paid by a built block's coinbase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinerData {
    pub script_public_key: ScriptPublicKey,
    pub extra_data: Vec<u8>,
}

impl MinerData {
    pub fn new(script_public_key: ScriptPublicKey, extra_data: Vec<u8>) -> Self {
        Self { script_public_key, extra_data }
    }
}

impl DagContext {
    pub(crate) fn build_block(
        &self,
        parents: Option<Vec<Hash>>,
        miner: &MinerData,
        transactions: Vec<Transaction>,
        timestamp: Option<i64>,
    ) -> ConsensusResult<Block> {
        let mut parent_ids = match parents {
            Some(hashes) => {
                hashes.iter().map(|h| self.index.lookup(h).ok_or(ConsensusError::Rule(RuleError::UnknownParent(*h)))).collect::<Result<Vec<_>, _>>()?
            }
            None => self.virtual_state.parents.clone(),
        };
        parent_ids.sort_by_key(|&id| self.index.hash(id));
        parent_ids.dedup();

        let ghostdag = self.ghostdag_manager().ghostdag(&parent_ids)?;
        let selected_parent = ghostdag.selected_parent.ok_or(ConsensusError::Rule(RuleError::NoParents))?;
        if self.is_violating_finality(selected_parent)? {
            return Err(RuleError::FinalityViolation(self.index.hash(selected_parent)).into());
        }

        let (base, multiset) = self.speculative_utxo_state(selected_parent)?;
        let accepting = self.accepting_block(&ghostdag)?;
        let outcome = self.calc_acceptance(&ghostdag, base, Some(multiset), accepting)?;

        let payload = CoinbasePayload::new(ghostdag.blue_score, miner.script_public_key.clone(), miner.extra_data.clone());
        let coinbase = self.expected_coinbase(&ghostdag, &outcome.acceptance_data, &payload)?;
        let mut transactions = transactions;
        transactions.sort_by(|a, b| a.subnetwork_id.cmp(&b.subnetwork_id));
        transactions.insert(0, coinbase);

        let timestamp = match timestamp {
            Some(timestamp) => timestamp,
            None => self.now_millis().max(self.past_median_time(self.index.ghostdag(selected_parent)) + 1),
        };
        let bits = self.required_difficulty(selected_parent);
        let multiset = outcome.multiset.ok_or_else(|| ConsensusError::invariant("multiset dropped during acceptance"))?;
        let mut header = Header::new_finalized(
            BLOCK_VERSION,
            self.index.hashes(parent_ids.iter().copied()),
            calc_hash_merkle_root(transactions.iter()),
            calc_accepted_id_merkle_root(outcome.accepted_ids),
            multiset.finalize(),
            timestamp,
            bits,
            0,
        );

        if !self.params().skip_proof_of_work {
            let state = PowState::new(&header);
            let nonce = (0..=u64::MAX)
                .find(|&nonce| state.check_pow(nonce).0)
                .ok_or_else(|| ConsensusError::Transient("nonce space exhausted".to_string()))?;
            header.nonce = nonce;
            header.finalize();
        }
        debug!(hash = %header.hash, blue_score = ghostdag.blue_score, txs = transactions.len(), "built block");
        Ok(Block::new(header, transactions))
    }
}
