//! Expected coinbase
//!
//! A block's coinbase pays every blue of its merge set: the subsidy at that
//! blue's blue score plus the fees of the blue's transactions this block
//! accepted, to the script named in the blue's own coinbase payload.

use crate::consensus::context::DagContext;
use crate::consensus::ghostdag::GhostdagData;
use crate::errors::{ConsensusError, ConsensusResult};
use consensus_core::acceptance_data::MergeSetAcceptanceData;
use consensus_core::block::Block;
use consensus_core::coinbase::{build_coinbase_transaction, CoinbasePayload};
use consensus_core::errors::RuleError;
use consensus_core::tx::{Transaction, TransactionOutput};

impl DagContext {
    /// Coinbase a block with `ghostdag` and this acceptance data must carry.
    /// `miner` supplies the script and extra data of the block's own payload;
    /// its blue score is replaced by the block's.
    pub(crate) fn expected_coinbase(
        &self,
        ghostdag: &GhostdagData,
        acceptance_data: &MergeSetAcceptanceData,
        miner: &CoinbasePayload,
    ) -> ConsensusResult<Transaction> {
        if acceptance_data.len() != ghostdag.mergeset_blues.len() {
            return Err(ConsensusError::invariant("acceptance data does not match the merge set blues"));
        }
        let mut outputs = Vec::with_capacity(ghostdag.mergeset_blues.len());
        for (&blue, block_acceptance) in ghostdag.mergeset_blues.iter().zip(acceptance_data) {
            // Genesis pays nothing
            if blue == self.genesis {
                continue;
            }
            let reward = self.params().calc_block_subsidy(self.index.blue_score(blue)).saturating_add(block_acceptance.total_fees());
            if reward == 0 {
                continue;
            }
            let block = self.storage.blocks.get(&block_acceptance.block_hash)?;
            let payload = coinbase_payload(&block)?;
            outputs.push(TransactionOutput::new(reward, payload.script_public_key));
        }
        outputs.sort_by(|a, b| (a.value, &a.script_public_key).cmp(&(b.value, &b.script_public_key)));
        let payload = CoinbasePayload::new(ghostdag.blue_score, miner.script_public_key.clone(), miner.extra_data.clone());
        Ok(build_coinbase_transaction(&payload, outputs))
    }

    pub(crate) fn validate_coinbase(&self, block: &Block, ghostdag: &GhostdagData, acceptance_data: &MergeSetAcceptanceData) -> ConsensusResult<()> {
        let coinbase = block.coinbase().ok_or(RuleError::NoTransactions)?;
        let miner = CoinbasePayload::deserialize(&coinbase.payload)?;
        let expected = self.expected_coinbase(ghostdag, acceptance_data, &miner)?;
        if expected.hash() != coinbase.hash() {
            return Err(RuleError::BadCoinbaseTransaction(format!(
                "coinbase {} does not match the expected coinbase {}",
                coinbase.id(),
                expected.id()
            ))
            .into());
        }
        Ok(())
    }
}

/// Payload of a stored block's coinbase. Stored blocks passed sanity checks,
/// so a malformed payload means corrupted state.
fn coinbase_payload(block: &Block) -> ConsensusResult<CoinbasePayload> {
    let coinbase = block.coinbase().ok_or_else(|| ConsensusError::invariant(format!("stored block {} has no coinbase", block.hash())))?;
    CoinbasePayload::deserialize(&coinbase.payload)
        .map_err(|e| ConsensusError::invariant(format!("stored block {} has a malformed coinbase payload: {e}", block.hash())))
}
