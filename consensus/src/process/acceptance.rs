//! Merge-set acceptance
//!
//! Computes the UTXO set a block sees. Starting from the selected parent's
//! set, the blues of the merge set are visited in GHOSTDAG order and every
//! transaction that still connects is accepted at the block's blue score.
//! Only the selected parent's coinbase is accepted; the others are paid for
//! through the expected coinbase instead.

use crate::consensus::context::DagContext;
use crate::consensus::dag::index::NodeId;
use crate::consensus::ghostdag::GhostdagData;
use crate::consensus::validation::AcceptingContext;
use crate::errors::{ConsensusError, ConsensusResult};
use consensus_core::acceptance_data::{BlockAcceptanceData, MergeSetAcceptanceData, TxAcceptanceData};
use consensus_core::errors::RuleError;
use consensus_core::tx::{Transaction, TransactionId, TransactionOutpoint, UtxoEntry};
use consensus_core::utxo::{DiffUtxoView, UtxoDiff, UtxoView};
use jio_muhash::Multiset;
use tracing::trace;

/// Result of accepting a merge set on top of the selected parent's UTXO set
#[derive(Debug, Clone)]
pub struct AcceptanceOutcome {
    /// From the full UTXO set to the accepting block's set
    pub diff: UtxoDiff,
    /// UTXO commitment state of the accepting block's set, when tracked
    pub multiset: Option<Multiset>,
    pub acceptance_data: MergeSetAcceptanceData,
    /// Ids of accepted transactions, in merge order
    pub accepted_ids: Vec<TransactionId>,
    /// Total mass of the accepted transactions
    pub accepted_mass: u64,
}

/// Where a merge set is being accepted
#[derive(Debug, Clone, Copy)]
pub struct AcceptingBlock {
    pub context: AcceptingContext,
    /// Chain tip used to date seconds-based relative locks
    pub selected_parent: NodeId,
}

impl DagContext {
    pub(crate) fn accepting_block(&self, ghostdag: &GhostdagData) -> ConsensusResult<AcceptingBlock> {
        let selected_parent =
            ghostdag.selected_parent.ok_or_else(|| ConsensusError::invariant("accepting a merge set without a selected parent"))?;
        Ok(AcceptingBlock {
            context: AcceptingContext { blue_score: ghostdag.blue_score, past_median_time: self.past_median_time(ghostdag) },
            selected_parent,
        })
    }

    /// Accepts the merge set of `ghostdag` on top of `base_diff`, which must
    /// take the full UTXO set to the selected parent's set.
    pub(crate) fn calc_acceptance(
        &self,
        ghostdag: &GhostdagData,
        base_diff: UtxoDiff,
        mut multiset: Option<Multiset>,
        accepting: AcceptingBlock,
    ) -> ConsensusResult<AcceptanceOutcome> {
        let blue_score = accepting.context.blue_score;
        let mut view = DiffUtxoView::new(&self.storage.utxo_set, base_diff);
        let mut acceptance_data = MergeSetAcceptanceData::with_capacity(ghostdag.mergeset_blues.len());
        let mut accepted_ids = Vec::new();
        let mut accepted_mass: u64 = 0;
        let mass_calculator = self.tx_validator.mass_calculator();

        for &blue in &ghostdag.mergeset_blues {
            let block_hash = self.index.hash(blue);
            let block = self.storage.blocks.get(&block_hash)?;
            let is_selected_parent = ghostdag.selected_parent == Some(blue);
            let mut tx_entries = Vec::with_capacity(block.transactions.len());

            for (tx_index, tx) in block.transactions.iter().enumerate() {
                let (is_accepted, fee, spent) = if tx.is_coinbase() {
                    if is_selected_parent && view.add_tx(tx, blue_score)? {
                        (true, 0, Vec::new())
                    } else {
                        (false, 0, Vec::new())
                    }
                } else {
                    let origin_median_time = |score: u64| self.selected_ancestor_median_time(accepting.selected_parent, score);
                    match self.tx_validator.check_connect(tx, &view, accepting.context, self.verifier.as_ref(), origin_median_time) {
                        Ok(connected) => {
                            if !view.add_tx(tx, blue_score)? {
                                return Err(ConsensusError::invariant(format!("connected transaction {} failed to apply", tx.id())));
                            }
                            (true, connected.fee, connected.spent)
                        }
                        Err(ConsensusError::Rule(err)) => {
                            trace!(tx = %tx.id(), block = %block_hash, %err, "transaction not accepted");
                            (false, 0, Vec::new())
                        }
                        Err(err) => return Err(err),
                    }
                };
                if is_accepted {
                    accepted_mass = accepted_mass.saturating_add(mass_calculator.calc_tx_mass(tx));
                    accepted_ids.push(tx.id());
                    if let Some(multiset) = multiset.as_mut() {
                        apply_to_multiset(multiset, tx, &spent, blue_score);
                    }
                }
                tx_entries.push(TxAcceptanceData { tx_index: tx_index as u32, tx_id: tx.id(), is_accepted, fee });
            }
            acceptance_data.push(BlockAcceptanceData { block_hash, tx_entries });
        }

        Ok(AcceptanceOutcome { diff: view.into_diff(), multiset, acceptance_data, accepted_ids, accepted_mass })
    }

    /// Validates the block's own non-coinbase transactions against its UTXO
    /// set, independently of each other. Any failure fails the block.
    pub(crate) fn validate_block_transactions(
        &self,
        transactions: &[Transaction],
        block_diff: &UtxoDiff,
        accepting: AcceptingBlock,
    ) -> ConsensusResult<()> {
        let view = DiffUtxoView::new(&self.storage.utxo_set, block_diff.clone());
        for tx in transactions.iter().filter(|tx| !tx.is_coinbase()) {
            let origin_median_time = |score: u64| self.selected_ancestor_median_time(accepting.selected_parent, score);
            self.tx_validator.check_connect(tx, &view, accepting.context, self.verifier.as_ref(), origin_median_time)?;
        }
        Ok(())
    }

    /// Diff from the full UTXO set to the UTXO set of `block`, which must be
    /// UTXO verified
    pub(crate) fn restore_utxo_diff(&self, block: NodeId) -> ConsensusResult<UtxoDiff> {
        self.storage.utxo_diffs.restore(&self.index.hash(block))
    }

    /// Looks `outpoint` up in the UTXO set of a verified block
    pub(crate) fn restore_past_utxo_entry(&self, block: NodeId, outpoint: &TransactionOutpoint) -> ConsensusResult<Option<UtxoEntry>> {
        let diff = self.restore_utxo_diff(block)?;
        Ok(DiffUtxoView::new(&self.storage.utxo_set, diff).get(outpoint)?)
    }

    /// UTXO diff and multiset of `block` without touching any state. Walks
    /// down to the nearest verified chain ancestor and replays acceptance of
    /// every unverified block above it.
    pub(crate) fn speculative_utxo_state(&self, block: NodeId) -> ConsensusResult<(UtxoDiff, Multiset)> {
        let mut pending = Vec::new();
        let mut current = block;
        while !self.index.status(current).is_valid() {
            let status = self.index.status(current);
            if status.is_disqualified_from_chain() {
                return Err(RuleError::InvalidAncestor(self.index.hash(current)).into());
            }
            pending.push(current);
            current = self
                .index
                .node(current)
                .selected_parent()
                .ok_or_else(|| ConsensusError::invariant("genesis is not UTXO verified"))?;
        }
        let hash = self.index.hash(current);
        let mut diff = self.storage.utxo_diffs.restore(&hash)?;
        let mut multiset = self.storage.multisets.get(&hash)?;
        for &id in pending.iter().rev() {
            let ghostdag = self.index.ghostdag(id);
            let accepting = self.accepting_block(ghostdag)?;
            let outcome = self.calc_acceptance(ghostdag, diff, Some(multiset), accepting)?;
            diff = outcome.diff;
            multiset = outcome.multiset.ok_or_else(|| ConsensusError::invariant("multiset dropped during acceptance"))?;
        }
        Ok((diff, multiset))
    }
}

/// Spent entries leave the commitment, created outputs enter it
fn apply_to_multiset(multiset: &mut Multiset, tx: &Transaction, spent: &[UtxoEntry], blue_score: u64) {
    for (input, entry) in tx.inputs.iter().zip(spent) {
        multiset.remove_element(&entry.commitment_bytes(&input.previous_outpoint));
    }
    let id = tx.id();
    for (index, output) in tx.outputs.iter().enumerate() {
        let entry = UtxoEntry::new(output.value, output.script_public_key.clone(), blue_score, tx.is_coinbase());
        multiset.add_element(&entry.commitment_bytes(&TransactionOutpoint::new(id, index as u32)));
    }
}
