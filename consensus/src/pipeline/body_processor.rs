//! UTXO verification
//!
//! A block is verified against the UTXO set of its selected parent, so the
//! unverified prefix of its selected chain is verified first, lowest block
//! first. A verified block gets a UTXO diff, a multiset and acceptance data.

use crate::consensus::context::DagContext;
use crate::consensus::dag::index::NodeId;
use crate::consensus::types::BlockStatus;
use crate::errors::{ConsensusError, ConsensusResult};
use consensus_core::errors::RuleError;
use consensus_core::merkle::calc_accepted_id_merkle_root;
use tracing::{debug, warn};

/// Outcome of verifying a block's selected chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChainVerification {
    /// The block and its whole chain are now valid
    Valid,
    /// `block` broke a rule; it and every chain block above it are disqualified
    Failed { block: NodeId, error: RuleError },
    /// The chain rests on a block that can never be verified
    Disqualified,
}

impl DagContext {
    pub(crate) fn verify_chain(&mut self, tip: NodeId) -> ConsensusResult<ChainVerification> {
        let mut pending = Vec::new();
        let mut current = tip;
        loop {
            match self.index.status(current) {
                BlockStatus::Valid => break,
                BlockStatus::DataStored | BlockStatus::UTXONotVerified => pending.push(current),
                status if status.is_finality_violator() => return Ok(ChainVerification::Disqualified),
                _ => {
                    for &block in &pending {
                        self.index.set_status(block, BlockStatus::DisqualifiedFromChain);
                    }
                    return Ok(ChainVerification::Disqualified);
                }
            }
            current = self
                .index
                .node(current)
                .selected_parent()
                .ok_or_else(|| ConsensusError::invariant("reached genesis without a verified block"))?;
        }

        for (i, &block) in pending.iter().enumerate().rev() {
            match self.verify_block_utxo(block) {
                Ok(()) => self.index.set_status(block, BlockStatus::Valid),
                Err(ConsensusError::Rule(error)) => {
                    warn!(block = %self.index.hash(block), %error, "UTXO verification failed");
                    for &above in &pending[..=i] {
                        self.index.set_status(above, BlockStatus::DisqualifiedFromChain);
                    }
                    return Ok(ChainVerification::Failed { block, error });
                }
                Err(err) => return Err(err),
            }
        }
        Ok(ChainVerification::Valid)
    }

    /// Verifies one block whose selected parent is valid and stores its UTXO
    /// state. Rule errors leave no trace in the stores.
    fn verify_block_utxo(&mut self, id: NodeId) -> ConsensusResult<()> {
        let hash = self.index.hash(id);
        let ghostdag = self.index.ghostdag(id).clone();
        let accepting = self.accepting_block(&ghostdag)?;
        let sp_hash = self.index.hash(accepting.selected_parent);
        let block = self.storage.blocks.get(&hash)?;

        let base = self.storage.utxo_diffs.restore(&sp_hash)?;
        let multiset = self.storage.multisets.get(&sp_hash)?;
        let outcome = self.calc_acceptance(&ghostdag, base, Some(multiset), accepting)?;

        let max_mass = self.params().max_mass_accepted_by_block;
        if outcome.accepted_mass > max_mass {
            return Err(RuleError::BlockMassTooHigh(outcome.accepted_mass, max_mass).into());
        }
        self.validate_block_transactions(&block.transactions, &outcome.diff, accepting)?;
        self.validate_coinbase(&block, &ghostdag, &outcome.acceptance_data)?;

        let accepted_id_merkle_root = calc_accepted_id_merkle_root(outcome.accepted_ids.clone());
        if accepted_id_merkle_root != block.header.accepted_id_merkle_root {
            return Err(RuleError::BadMerkleRoot(block.header.accepted_id_merkle_root, accepted_id_merkle_root).into());
        }
        let multiset = outcome.multiset.ok_or_else(|| ConsensusError::invariant("multiset dropped during acceptance"))?;
        let commitment = multiset.finalize();
        if commitment != block.header.utxo_commitment {
            return Err(RuleError::BadUTXOCommitment(block.header.utxo_commitment, commitment).into());
        }

        let parents = self.index.hashes(self.index.node(id).parents.iter().copied());
        self.storage.utxo_diffs.attach(hash, outcome.diff, &parents)?;
        self.storage.multisets.insert(hash, &multiset);
        self.storage.acceptance.insert(hash, outcome.acceptance_data);
        debug!(%hash, accepted = outcome.accepted_ids.len(), "block UTXO verified");
        Ok(())
    }
}
