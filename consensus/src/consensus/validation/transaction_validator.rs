//! Transaction validation
//!
//! Two layers: checks on a transaction alone (shape, values, payload,
//! mass) and checks against a UTXO view at the accepting block (inputs exist
//! and are mature, values add up, scripts unlock, lock times have passed).

use crate::errors::ConsensusResult;
use consensus_core::config::params::Params;
use consensus_core::constants::{
    LOCK_TIME_THRESHOLD, MAX_SOMPI, MAX_TX_IN_SEQUENCE_NUM, SEQUENCE_LOCK_TIME_DISABLED, SEQUENCE_LOCK_TIME_GRANULARITY,
    SEQUENCE_LOCK_TIME_IS_SECONDS, SEQUENCE_LOCK_TIME_MASK,
};
use consensus_core::errors::{RuleError, RuleResult};
use consensus_core::hashing::double_sha256;
use consensus_core::mass::MassCalculator;
use consensus_core::script::ScriptVerifier;
use consensus_core::subnets::SUBNETWORK_ID_REGISTRY;
use consensus_core::tx::{Transaction, TransactionOutpoint, UtxoEntry};
use consensus_core::utxo::UtxoView;
use consensus_core::ZERO_HASH;
use std::collections::HashSet;

/// Where a transaction is being accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptingContext {
    pub blue_score: u64,
    pub past_median_time: i64,
}

/// Result of connecting a transaction to a UTXO view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedTx {
    pub fee: u64,
    /// Entries spent by the inputs, in input order
    pub spent: Vec<UtxoEntry>,
}

pub struct TransactionValidator {
    mass_calculator: MassCalculator,
    max_mass: u64,
    coinbase_maturity: u64,
}

impl TransactionValidator {
    pub fn new(params: &Params) -> Self {
        Self {
            mass_calculator: MassCalculator::new(params),
            max_mass: params.max_mass_accepted_by_block,
            coinbase_maturity: params.block_coinbase_maturity,
        }
    }

    pub fn mass_calculator(&self) -> &MassCalculator {
        &self.mass_calculator
    }

    pub fn validate_tx_in_isolation(&self, tx: &Transaction) -> RuleResult<()> {
        let id = tx.id();
        if !tx.is_coinbase() && tx.inputs.is_empty() {
            return Err(RuleError::NoTxInputs(id));
        }
        self.check_output_values(tx)?;
        check_duplicate_inputs(tx)?;
        check_subnetwork_and_payload(tx)?;
        let mass = self.mass_calculator.calc_tx_mass(tx);
        if mass > self.max_mass {
            return Err(RuleError::TxMassTooHigh(id, mass, self.max_mass));
        }
        Ok(())
    }

    fn check_output_values(&self, tx: &Transaction) -> RuleResult<()> {
        let mut total: u64 = 0;
        for (i, output) in tx.outputs.iter().enumerate() {
            if output.value > MAX_SOMPI {
                return Err(RuleError::BadTxOutValue(tx.id(), format!("output {i} value {} is higher than max allowed {MAX_SOMPI}", output.value)));
            }
            total = total
                .checked_add(output.value)
                .filter(|&t| t <= MAX_SOMPI)
                .ok_or_else(|| RuleError::BadTxOutValue(tx.id(), format!("total output value is higher than max allowed {MAX_SOMPI}")))?;
        }
        Ok(())
    }

    /// Connects `tx` to `view` as accepted under `ctx` and returns its fee.
    ///
    /// `origin_median_time` maps the blue score at which an input was created
    /// to the past median time of the selected-chain block right below it; it
    /// is only called for inputs with a seconds-based relative lock.
    pub fn check_connect<V, F>(
        &self,
        tx: &Transaction,
        view: &V,
        ctx: AcceptingContext,
        verifier: &dyn ScriptVerifier,
        origin_median_time: F,
    ) -> ConsensusResult<ConnectedTx>
    where
        V: UtxoView + ?Sized,
        F: Fn(u64) -> ConsensusResult<i64>,
    {
        let id = tx.id();
        let mut spent = Vec::with_capacity(tx.inputs.len());
        let mut total_in: u64 = 0;
        for input in &tx.inputs {
            let outpoint = input.previous_outpoint;
            let entry = view.get(&outpoint)?.ok_or(RuleError::MissingTxOut(outpoint))?;
            if entry.is_coinbase && ctx.blue_score < entry.block_blue_score.saturating_add(self.coinbase_maturity) {
                return Err(RuleError::ImmatureSpend(outpoint, entry.block_blue_score, ctx.blue_score).into());
            }
            if entry.amount > MAX_SOMPI {
                return Err(RuleError::SpendTooHigh(id, format!("input {outpoint} amount {} is higher than max allowed", entry.amount)).into());
            }
            total_in = total_in
                .checked_add(entry.amount)
                .filter(|&t| t <= MAX_SOMPI)
                .ok_or_else(|| RuleError::SpendTooHigh(id, format!("total input amount is higher than max allowed {MAX_SOMPI}")))?;
            spent.push(entry);
        }

        for (i, (input, entry)) in tx.inputs.iter().zip(&spent).enumerate() {
            verifier.verify_input(tx, i, entry).map_err(|msg| RuleError::ScriptValidation(input.previous_outpoint, msg))?;
        }

        for index in 0..tx.outputs.len() {
            let outpoint = TransactionOutpoint::new(id, index as u32);
            if view.get(&outpoint)?.is_some() {
                return Err(RuleError::OverwriteTx(outpoint).into());
            }
        }

        let total_out = tx.outputs.iter().fold(0u64, |acc, o| acc.saturating_add(o.value));
        if total_out > total_in {
            return Err(RuleError::BadFees(id, total_out, total_in).into());
        }

        check_tx_finality(tx, ctx)?;
        self.check_sequence_locks(tx, &spent, ctx, origin_median_time)?;
        Ok(ConnectedTx { fee: total_in - total_out, spent })
    }

    fn check_sequence_locks<F>(&self, tx: &Transaction, spent: &[UtxoEntry], ctx: AcceptingContext, origin_median_time: F) -> ConsensusResult<()>
    where
        F: Fn(u64) -> ConsensusResult<i64>,
    {
        // -1 means no lock of that kind
        let mut lock_millis: i64 = -1;
        let mut lock_blue_score: i64 = -1;
        for (input, entry) in tx.inputs.iter().zip(spent) {
            let sequence = input.sequence;
            if sequence & SEQUENCE_LOCK_TIME_DISABLED == SEQUENCE_LOCK_TIME_DISABLED {
                continue;
            }
            let relative_lock = (sequence & SEQUENCE_LOCK_TIME_MASK) as i64;
            if sequence & SEQUENCE_LOCK_TIME_IS_SECONDS == SEQUENCE_LOCK_TIME_IS_SECONDS {
                let median_time = origin_median_time(entry.block_blue_score.saturating_sub(1))?;
                let lock = median_time + (relative_lock << SEQUENCE_LOCK_TIME_GRANULARITY) - 1;
                lock_millis = lock_millis.max(lock);
            } else {
                let lock = entry.block_blue_score as i64 + relative_lock - 1;
                lock_blue_score = lock_blue_score.max(lock);
            }
        }
        if lock_millis >= ctx.past_median_time || lock_blue_score >= ctx.blue_score as i64 {
            return Err(RuleError::UnfinalizedTx(
                tx.id(),
                format!(
                    "sequence lock not met (blue score lock {lock_blue_score} at {}, time lock {lock_millis} at {})",
                    ctx.blue_score, ctx.past_median_time
                ),
            )
            .into());
        }
        Ok(())
    }
}

/// A lock time below the threshold is a blue score, above it a time in
/// milliseconds. Inputs with the maximal sequence number opt out of the lock.
pub fn check_tx_finality(tx: &Transaction, ctx: AcceptingContext) -> RuleResult<()> {
    let lock_time = tx.lock_time;
    if lock_time == 0 {
        return Ok(());
    }
    let reference = if lock_time < LOCK_TIME_THRESHOLD { ctx.blue_score as i128 } else { ctx.past_median_time as i128 };
    if (lock_time as i128) < reference {
        return Ok(());
    }
    if tx.inputs.iter().all(|input| input.sequence == MAX_TX_IN_SEQUENCE_NUM) {
        return Ok(());
    }
    Err(RuleError::UnfinalizedTx(tx.id(), format!("lock time {lock_time} not reached")))
}

fn check_duplicate_inputs(tx: &Transaction) -> RuleResult<()> {
    let mut seen = HashSet::with_capacity(tx.inputs.len());
    for input in &tx.inputs {
        if !seen.insert(input.previous_outpoint) {
            return Err(RuleError::DuplicateTxInputs(tx.id()));
        }
    }
    Ok(())
}

fn check_subnetwork_and_payload(tx: &Transaction) -> RuleResult<()> {
    let id = tx.id();
    if tx.subnetwork_id.is_native() {
        if tx.gas != 0 {
            return Err(RuleError::InvalidGas(id));
        }
        if !tx.payload.is_empty() {
            return Err(RuleError::InvalidPayload(id));
        }
    }
    if tx.subnetwork_id == SUBNETWORK_ID_REGISTRY {
        return Err(RuleError::InvalidSubnetwork(id));
    }
    let expected = if tx.payload.is_empty() { ZERO_HASH } else { double_sha256(&tx.payload) };
    if tx.payload_hash != expected {
        return Err(RuleError::InvalidPayloadHash(id));
    }
    Ok(())
}
