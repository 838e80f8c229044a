//! Context-free block body checks
//!
//! Coinbase placement and payload, transaction order, per-transaction sanity,
//! the merkle root and in-block double spends. Nothing here reads the DAG.

use super::transaction_validator::TransactionValidator;
use consensus_core::block::Block;
use consensus_core::coinbase::CoinbasePayload;
use consensus_core::config::params::Params;
use consensus_core::errors::{RuleError, RuleResult};
use consensus_core::merkle::calc_hash_merkle_root;
use std::collections::{HashMap, HashSet};

pub struct BlockValidator {
    tx_validator: TransactionValidator,
    max_coinbase_payload_len: usize,
    max_block_mass: u64,
}

impl BlockValidator {
    pub fn new(params: &Params) -> Self {
        Self {
            tx_validator: TransactionValidator::new(params),
            max_coinbase_payload_len: params.max_coinbase_payload_len,
            max_block_mass: params.max_mass_accepted_by_block,
        }
    }

    pub fn validate_body_in_isolation(&self, block: &Block) -> RuleResult<()> {
        self.check_coinbase(block)?;
        check_transactions_order(block)?;
        for tx in &block.transactions {
            self.tx_validator.validate_tx_in_isolation(tx)?;
        }
        check_merkle_root(block)?;
        check_duplicates_and_double_spends(block)?;
        let mass = self.tx_validator.mass_calculator().calc_block_mass(&block.transactions);
        if mass > self.max_block_mass {
            return Err(RuleError::BlockMassTooHigh(mass, self.max_block_mass));
        }
        Ok(())
    }

    fn check_coinbase(&self, block: &Block) -> RuleResult<()> {
        let coinbase = block.transactions.first().ok_or(RuleError::NoTransactions)?;
        if !coinbase.is_coinbase() {
            return Err(RuleError::FirstTxNotCoinbase);
        }
        if let Some(i) = block.transactions.iter().skip(1).position(|tx| tx.is_coinbase()) {
            return Err(RuleError::MultipleCoinbases(i + 1));
        }
        if !coinbase.inputs.is_empty() {
            return Err(RuleError::BadCoinbaseTransaction(format!("coinbase has {} inputs", coinbase.inputs.len())));
        }
        if coinbase.payload.len() > self.max_coinbase_payload_len {
            return Err(RuleError::BadCoinbasePayloadLen(coinbase.payload.len(), self.max_coinbase_payload_len));
        }
        CoinbasePayload::deserialize(&coinbase.payload)?;
        Ok(())
    }
}

fn check_transactions_order(block: &Block) -> RuleResult<()> {
    let rest = &block.transactions[1..];
    if rest.windows(2).any(|w| w[0].subnetwork_id > w[1].subnetwork_id) {
        return Err(RuleError::TransactionsNotSorted);
    }
    Ok(())
}

fn check_merkle_root(block: &Block) -> RuleResult<()> {
    let computed = calc_hash_merkle_root(&block.transactions);
    if computed != block.header.hash_merkle_root {
        return Err(RuleError::BadMerkleRoot(block.header.hash_merkle_root, computed));
    }
    Ok(())
}

fn check_duplicates_and_double_spends(block: &Block) -> RuleResult<()> {
    let mut ids = HashMap::with_capacity(block.transactions.len());
    for tx in &block.transactions {
        if ids.insert(tx.id(), ()).is_some() {
            return Err(RuleError::DuplicateTx(tx.id()));
        }
    }
    let mut spent = HashSet::new();
    for tx in &block.transactions {
        for input in &tx.inputs {
            let outpoint = input.previous_outpoint;
            if !spent.insert(outpoint) {
                return Err(RuleError::DoubleSpend(outpoint));
            }
            if ids.contains_key(&outpoint.transaction_id) {
                return Err(RuleError::ChainedTransactions(outpoint));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use consensus_core::coinbase::build_coinbase_transaction;
    use consensus_core::header::Header;
    use consensus_core::subnets::SUBNETWORK_ID_NATIVE;
    use consensus_core::tx::{ScriptPublicKey, Transaction, TransactionInput, TransactionOutpoint, TransactionOutput};
    use consensus_core::{Hash, ZERO_HASH};

    fn coinbase(extra: Vec<u8>) -> Transaction {
        build_coinbase_transaction(&CoinbasePayload::new(1, ScriptPublicKey::new(vec![0x51]), extra), vec![])
    }

    fn spend(n: u64) -> Transaction {
        let outpoint = TransactionOutpoint::new(Hash::from_le_u64([n, 0, 0, 0]), 0);
        Transaction::new(
            0,
            vec![TransactionInput::new(outpoint, vec![], 0, 1)],
            vec![TransactionOutput::new(1, ScriptPublicKey::new(vec![0x51]))],
            0,
            SUBNETWORK_ID_NATIVE,
            0,
            ZERO_HASH,
            vec![],
        )
    }

    fn block(txs: Vec<Transaction>) -> Block {
        let merkle = calc_hash_merkle_root(&txs);
        let header = Header::new_finalized(1, vec![ZERO_HASH], merkle, ZERO_HASH, ZERO_HASH, 0, 0x207fffff, 0);
        Block::new(header, txs)
    }

    #[test]
    fn test_valid_body() {
        let validator = BlockValidator::new(&Params::simnet());
        assert_eq!(validator.validate_body_in_isolation(&block(vec![coinbase(vec![]), spend(1), spend(2)])), Ok(()));
    }

    #[test]
    fn test_coinbase_rules() {
        let validator = BlockValidator::new(&Params::simnet());
        assert_eq!(validator.validate_body_in_isolation(&block(vec![])), Err(RuleError::NoTransactions));
        assert_eq!(validator.validate_body_in_isolation(&block(vec![spend(1)])), Err(RuleError::FirstTxNotCoinbase));
        assert_eq!(
            validator.validate_body_in_isolation(&block(vec![coinbase(vec![]), coinbase(vec![1])])),
            Err(RuleError::MultipleCoinbases(1))
        );

        // 8 bytes of blue score, 1 length byte and a 1-byte script leave 140 bytes of extra data
        let max_extra = 150 - 10;
        assert_eq!(validator.validate_body_in_isolation(&block(vec![coinbase(vec![0; max_extra])])), Ok(()));
        assert_eq!(
            validator.validate_body_in_isolation(&block(vec![coinbase(vec![0; max_extra + 1])])),
            Err(RuleError::BadCoinbasePayloadLen(151, 150))
        );
    }

    #[test]
    fn test_merkle_and_spends() {
        let validator = BlockValidator::new(&Params::simnet());
        let mut bad_merkle = block(vec![coinbase(vec![]), spend(1)]);
        bad_merkle.header.hash_merkle_root = ZERO_HASH;
        bad_merkle.header.finalize();
        assert!(matches!(validator.validate_body_in_isolation(&bad_merkle), Err(RuleError::BadMerkleRoot(..))));

        assert_eq!(validator.validate_body_in_isolation(&block(vec![coinbase(vec![]), spend(1), spend(1)])), Err(RuleError::DuplicateTx(spend(1).id())));

        let mut twin = spend(1);
        twin.outputs[0].value = 2;
        twin.finalize();
        let outpoint = twin.inputs[0].previous_outpoint;
        assert_eq!(validator.validate_body_in_isolation(&block(vec![coinbase(vec![]), spend(1), twin])), Err(RuleError::DoubleSpend(outpoint)));

        let parent = spend(1);
        let child = Transaction::new(
            0,
            vec![TransactionInput::new(TransactionOutpoint::new(parent.id(), 0), vec![], 0, 1)],
            vec![TransactionOutput::new(1, ScriptPublicKey::new(vec![0x51]))],
            0,
            SUBNETWORK_ID_NATIVE,
            0,
            ZERO_HASH,
            vec![],
        );
        assert!(matches!(
            validator.validate_body_in_isolation(&block(vec![coinbase(vec![]), parent, child])),
            Err(RuleError::ChainedTransactions(_))
        ));
    }

    #[test]
    fn test_subnetwork_order() {
        let validator = BlockValidator::new(&Params::simnet());
        let mut custom = spend(3);
        let mut bytes = [0u8; 20];
        bytes[0] = 9;
        custom.subnetwork_id = consensus_core::subnets::SubnetworkId::from_bytes(bytes);
        custom.finalize();
        assert_eq!(
            validator.validate_body_in_isolation(&block(vec![coinbase(vec![]), custom, spend(1)])),
            Err(RuleError::TransactionsNotSorted)
        );
    }
}
