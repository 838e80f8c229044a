//! End-to-end scenarios driving the full pipeline through the block builder

use super::mining::MinerData;
use crate::consensus::clock::MockClock;
use crate::consensus::notify::ConsensusEvent;
use crate::consensus::storage::ConsensusStorage;
use crate::consensus::types::{BlockOutcome, BlockStatus, ConsensusConfig};
use crate::consensus::Consensus;
use crate::errors::ConsensusError;
use consensus_core::block::Block;
use consensus_core::config::Params;
use consensus_core::constants::MAX_TX_IN_SEQUENCE_NUM;
use consensus_core::errors::RuleError;
use consensus_core::merkle::calc_hash_merkle_root;
use consensus_core::script::StandardScriptVerifier;
use consensus_core::subnets::SUBNETWORK_ID_NATIVE;
use consensus_core::tx::{ScriptPublicKey, Transaction, TransactionInput, TransactionOutpoint, TransactionOutput};
use consensus_core::{Hash, KType, ZERO_HASH};
use database::Database;
use std::sync::Arc;

fn test_params(k: KType, finality_interval: u64) -> Params {
    let mut params = Params::simnet();
    params.ghostdag_k = k;
    params.finality_duration = finality_interval * params.target_time_per_block;
    params
}

struct TestConsensus {
    consensus: Consensus,
    clock: Arc<MockClock>,
    miner: MinerData,
}

impl TestConsensus {
    fn new(params: Params) -> Self {
        Self::with_storage(params, ConsensusStorage::in_memory())
    }

    fn with_storage(params: Params, storage: ConsensusStorage) -> Self {
        let clock = Arc::new(MockClock::new(params.genesis_timestamp + 1000));
        let config = ConsensusConfig::new(params);
        let consensus = Consensus::with_parts(config, storage, clock.clone(), Arc::new(StandardScriptVerifier)).unwrap();
        Self { consensus, clock, miner: MinerData::new(ScriptPublicKey::new(vec![0x51]), vec![]) }
    }

    fn genesis(&self) -> Hash {
        self.consensus.genesis_hash()
    }

    fn build_with_txs(&self, parents: &[Hash], txs: Vec<Transaction>) -> Block {
        self.clock.advance(1000);
        self.consensus.build_block(Some(parents.to_vec()), &self.miner, txs, None).unwrap()
    }

    fn build(&self, parents: &[Hash]) -> Block {
        self.build_with_txs(parents, vec![])
    }

    fn submit(&self, block: Block) -> BlockStatus {
        match self.consensus.process_block(block).unwrap().outcome {
            BlockOutcome::Accepted(status) => status,
            other => panic!("block not accepted: {other:?}"),
        }
    }

    fn add(&self, parents: &[Hash]) -> Hash {
        let block = self.build(parents);
        let hash = block.hash();
        self.submit(block);
        hash
    }

    fn add_chain(&self, from: Hash, len: usize) -> Vec<Hash> {
        let mut chain = Vec::with_capacity(len);
        let mut tip = from;
        for _ in 0..len {
            tip = self.add(&[tip]);
            chain.push(tip);
        }
        chain
    }

    /// Builds a chain here and returns the blocks for submission elsewhere
    fn mine_chain(&self, from: Hash, len: usize) -> Vec<Block> {
        let mut blocks = Vec::with_capacity(len);
        let mut tip = from;
        for _ in 0..len {
            let block = self.build(&[tip]);
            tip = block.hash();
            self.submit(block.clone());
            blocks.push(block);
        }
        blocks
    }
}

fn rule_error<T: std::fmt::Debug>(result: Result<T, ConsensusError>) -> RuleError {
    match result {
        Err(ConsensusError::Rule(e)) => e,
        other => panic!("expected a rule error, got {other:?}"),
    }
}

fn spend(outpoint: TransactionOutpoint, value: u64) -> Transaction {
    Transaction::new(
        0,
        vec![TransactionInput::new(outpoint, vec![], MAX_TX_IN_SEQUENCE_NUM, 1)],
        vec![TransactionOutput::new(value, ScriptPublicKey::new(vec![0x51]))],
        0,
        SUBNETWORK_ID_NATIVE,
        0,
        ZERO_HASH,
        vec![],
    )
}

#[test]
fn test_genesis_state() {
    let tc = TestConsensus::new(test_params(18, 100));
    let genesis = tc.genesis();
    assert_eq!(tc.consensus.tips(), vec![genesis]);
    assert_eq!(tc.consensus.selected_tip(), genesis);
    assert_eq!(tc.consensus.last_finality_point(), genesis);
    assert_eq!(tc.consensus.virtual_parents(), vec![genesis]);
    assert_eq!(tc.consensus.virtual_blue_score(), 1);
    assert_eq!(tc.consensus.block_status(&genesis), Some(BlockStatus::Valid));
    assert!(tc.consensus.finality_conflicts().is_empty());
}

#[test]
fn test_three_parent_merge() {
    let tc = TestConsensus::new(test_params(18, 100));
    let g = tc.genesis();
    let a = tc.add(&[g]);
    let b = tc.add(&[g]);
    let c = tc.add(&[g]);
    let d = tc.add(&[a, b, c]);

    let info = tc.consensus.block_info(&d).unwrap();
    let expected_sp = *[a, b, c].iter().min().unwrap();
    assert_eq!(info.selected_parent, Some(expected_sp));
    assert_eq!(info.blue_score, 4);
    assert_eq!(info.blues.len(), 3);
    assert_eq!(info.blues[0], expected_sp);
    assert!(info.reds.is_empty());
    assert_eq!(info.status, BlockStatus::Valid);
    assert_eq!(tc.consensus.tips(), vec![d]);
    assert_eq!(tc.consensus.selected_tip(), d);
    assert!(tc.consensus.is_in_past(&a, &d).unwrap());
    assert!(!tc.consensus.is_in_past(&d, &a).unwrap());
}

#[test]
fn test_chain_events_and_selected_chain() {
    let tc = TestConsensus::new(test_params(18, 100));
    let mut events = tc.consensus.subscribe();
    let g = tc.genesis();
    let chain = tc.add_chain(g, 3);

    assert_eq!(tc.consensus.selected_parent_chain(), [vec![g], chain.clone()].concat());
    let mut added = Vec::new();
    let mut chain_added = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            ConsensusEvent::BlockAdded { hash, status, was_unorphaned, .. } => {
                assert_eq!(status, BlockStatus::Valid);
                assert!(!was_unorphaned);
                added.push(hash);
            }
            ConsensusEvent::ChainChanged { removed, added } => {
                assert!(removed.is_empty());
                chain_added.extend(added);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(added, chain);
    assert_eq!(chain_added, chain);
}

#[test]
fn test_competing_branch_reorgs_selected_chain() {
    let tc = TestConsensus::new(test_params(18, 100));
    let g = tc.genesis();
    let short = tc.add_chain(g, 2);
    let long = tc.add_chain(g, 4);

    assert_eq!(tc.consensus.selected_tip(), long[3]);
    assert!(!tc.consensus.selected_parent_chain().contains(&short[1]));
    // The losing branch is merged by the virtual
    assert!(tc.consensus.virtual_parents().contains(&short[1]));
    assert_eq!(tc.consensus.virtual_parents()[0], long[3]);
}

#[test]
fn test_bounded_merge_depth_violation() {
    let tc = TestConsensus::new(test_params(3, 10));
    let g = tc.genesis();
    let red = tc.add(&[g]);
    let chain = tc.add_chain(g, 12);
    assert_eq!(tc.consensus.last_finality_point(), chain[9]);

    let merging = tc.build(&[chain[11], red]);
    let hash = merging.hash();
    assert_eq!(rule_error(tc.consensus.process_block(merging)), RuleError::ViolatingBoundedMergeDepth(red));
    assert_eq!(tc.consensus.block_status(&hash), Some(BlockStatus::ValidateFailed));
    assert_eq!(tc.consensus.selected_tip(), chain[11]);
    // The virtual never merges the violating red either
    assert!(!tc.consensus.virtual_parents().contains(&red));
}

#[test]
fn test_merge_set_limit() {
    let mut params = test_params(18, 100);
    params.merge_set_size_limit = 3;
    let tc = TestConsensus::new(params);
    let g = tc.genesis();
    let parallel: Vec<Hash> = (0..5).map(|_| tc.add(&[g])).collect();
    assert!(tc.consensus.virtual_parents().len() <= 3);

    let mut parents = parallel.clone();
    parents.sort();
    let merging = tc.build(&parents);
    assert_eq!(rule_error(tc.consensus.process_block(merging)), RuleError::ViolatingMergeLimit(5, 3));
}

#[test]
fn test_merge_set_at_the_limit_is_accepted() {
    let mut params = test_params(18, 100);
    params.merge_set_size_limit = 3;
    let tc = TestConsensus::new(params);
    let g = tc.genesis();
    let mut parallel: Vec<Hash> = (0..4).map(|_| tc.add(&[g])).collect();
    parallel.sort();

    // Selected parent plus three merged blocks is one too many
    let over = tc.build(&parallel);
    let over_hash = over.hash();
    assert_eq!(rule_error(tc.consensus.process_block(over)), RuleError::ViolatingMergeLimit(4, 3));
    assert_eq!(tc.consensus.block_status(&over_hash), Some(BlockStatus::ValidateFailed));

    let at_limit = tc.build(&parallel[..3]);
    let hash = at_limit.hash();
    assert_eq!(tc.submit(at_limit), BlockStatus::Valid);
    let info = tc.consensus.block_info(&hash).unwrap();
    assert_eq!(info.blues.len() + info.reds.len(), 3);
    assert_eq!(tc.consensus.selected_tip(), hash);
}

#[test]
fn test_redundant_parent_recorded_as_invalid() {
    let tc = TestConsensus::new(test_params(18, 100));
    let g = tc.genesis();
    let a = tc.add(&[g]);
    let mut block = tc.build(&[a]);
    let mut parents = vec![g, a];
    parents.sort();
    block.header.parents = parents;
    block.header.finalize();
    let hash = block.hash();

    assert_eq!(rule_error(tc.consensus.process_block(block.clone())), RuleError::InvalidParentsRelation(g, a));
    assert_eq!(tc.consensus.block_status(&hash), Some(BlockStatus::ValidateFailed));
    assert_eq!(tc.consensus.selected_tip(), a);
    assert_eq!(tc.consensus.virtual_parents(), vec![a]);
    // Resubmission is answered from the index
    assert_eq!(rule_error(tc.consensus.process_block(block)), RuleError::DuplicateBlock(hash));
}

#[test]
fn test_storage_failure_surfaces_from_tick() {
    let dir = tempfile::tempdir().unwrap();
    let params = test_params(18, 100);
    let offset = params.max_timestamp_offset();
    let db = Arc::new(Database::open(dir.path()).unwrap());
    let config = ConsensusConfig::new(params.clone());
    let tc = TestConsensus::with_storage(params, ConsensusStorage::with_db(db.clone(), &config));
    let g = tc.genesis();
    let now = tc.clock.now_millis();
    let block = tc.consensus.build_block(Some(vec![g]), &tc.miner, vec![], Some(now + offset + 10_000)).unwrap();
    assert!(tc.consensus.process_block(block).unwrap().is_delayed());

    db.close();
    tc.clock.advance(10_001);
    let err = tc.consensus.tick().unwrap_err();
    assert!(err.is_transient(), "{err:?}");
    assert!(!err.is_rule_error());
}

#[test]
fn test_delayed_block_released_by_tick() {
    let params = test_params(18, 100);
    let offset = params.max_timestamp_offset();
    let tc = TestConsensus::new(params);
    let g = tc.genesis();
    let now = tc.clock.now_millis();
    let block = tc.consensus.build_block(Some(vec![g]), &tc.miner, vec![], Some(now + offset + 10_000)).unwrap();
    let hash = block.hash();

    let result = tc.consensus.process_block(block).unwrap();
    assert!(result.is_delayed());
    assert!(!tc.consensus.is_in_dag(&hash));
    assert!(tc.consensus.is_known_block(&hash));
    assert_eq!(tc.consensus.delayed_count(), 1);

    assert!(tc.consensus.tick().unwrap().is_empty());
    tc.clock.advance(10_001);
    assert_eq!(tc.consensus.tick().unwrap(), vec![hash]);
    assert!(tc.consensus.is_in_dag(&hash));
    assert_eq!(tc.consensus.block_status(&hash), Some(BlockStatus::Valid));
    assert_eq!(tc.consensus.delayed_count(), 0);
}

#[test]
fn test_delay_not_allowed() {
    let params = test_params(18, 100);
    let offset = params.max_timestamp_offset();
    let tc = TestConsensus::new(params);
    let now = tc.clock.now_millis();
    let block = tc.consensus.build_block(None, &tc.miner, vec![], Some(now + offset + 1)).unwrap();
    let hash = block.hash();
    let flags = crate::consensus::types::BehaviorFlags { disallow_delay: true, ..Default::default() };
    assert_eq!(rule_error(tc.consensus.process_block_with_flags(block, flags)), RuleError::DelayedBlockNotAllowed(hash));
    assert!(!tc.consensus.is_known_block(&hash));
}

#[test]
fn test_orphan_resolution() {
    let params = test_params(18, 100);
    let miner = TestConsensus::new(params.clone());
    let blocks = miner.mine_chain(miner.genesis(), 2);
    let (first, second) = (blocks[0].clone(), blocks[1].clone());

    let tc = TestConsensus::new(params);
    let mut events = tc.consensus.subscribe();
    let result = tc.consensus.process_block(second.clone()).unwrap();
    assert!(result.is_orphan());
    assert!(tc.consensus.is_known_block(&second.hash()));
    assert!(!tc.consensus.is_in_dag(&second.hash()));
    assert_eq!(rule_error(tc.consensus.process_block(second.clone())), RuleError::DuplicateBlock(second.hash()));

    let result = tc.consensus.process_block(first.clone()).unwrap();
    assert_eq!(result.outcome, BlockOutcome::Accepted(BlockStatus::Valid));
    assert_eq!(result.released, vec![second.hash()]);
    assert_eq!(tc.consensus.selected_tip(), second.hash());
    assert_eq!(tc.consensus.orphan_count(), 0);

    let unorphaned: Vec<(Hash, bool)> = std::iter::from_fn(|| events.try_recv().ok())
        .filter_map(|e| match e {
            ConsensusEvent::BlockAdded { hash, was_unorphaned, .. } => Some((hash, was_unorphaned)),
            _ => None,
        })
        .collect();
    assert_eq!(unorphaned, vec![(first.hash(), false), (second.hash(), true)]);
}

#[test]
fn test_orphans_not_allowed() {
    let params = test_params(18, 100);
    let miner = TestConsensus::new(params.clone());
    let blocks = miner.mine_chain(miner.genesis(), 2);
    let tc = TestConsensus::new(params);
    let flags = crate::consensus::types::BehaviorFlags { disallow_orphans: true, ..Default::default() };
    let hash = blocks[1].hash();
    assert_eq!(rule_error(tc.consensus.process_block_with_flags(blocks[1].clone(), flags)), RuleError::OrphanBlockNotAllowed(hash));
}

#[test]
fn test_wrong_coinbase_amount_rejected() {
    let tc = TestConsensus::new(test_params(18, 100));
    let a = tc.add(&[tc.genesis()]);
    let mut block = tc.build(&[a]);
    block.transactions[0].outputs[0].value += 1;
    block.transactions[0].finalize();
    block.header.hash_merkle_root = calc_hash_merkle_root(block.transactions.iter());
    block.header.finalize();
    let hash = block.hash();

    assert!(matches!(rule_error(tc.consensus.process_block(block)), RuleError::BadCoinbaseTransaction(_)));
    assert_eq!(tc.consensus.block_status(&hash), Some(BlockStatus::ValidateFailed));
    assert_eq!(tc.consensus.selected_tip(), a);
    assert_eq!(tc.consensus.virtual_parents(), vec![a]);
}

#[test]
fn test_coinbase_maturity_and_spend() {
    let params = test_params(18, 1000);
    let maturity = params.block_coinbase_maturity;
    let subsidy = params.calc_block_subsidy(1);
    let tc = TestConsensus::new(params);
    let chain = tc.add_chain(tc.genesis(), 3);

    // The coinbase of the second block pays the miner of the first; the third block accepts it
    let second = tc.consensus.build_block(Some(vec![chain[0]]), &tc.miner, vec![], None).unwrap();
    assert_eq!(tc.consensus.block_info(&chain[1]).unwrap().blue_score, 2);
    let coinbase_id = second.transactions[0].id();
    let outpoint = TransactionOutpoint::new(coinbase_id, 0);
    let entry = tc.consensus.get_utxo_entry(&outpoint).unwrap().unwrap();
    assert_eq!(entry.amount, subsidy);
    assert_eq!(entry.block_blue_score, 3);
    assert!(entry.is_coinbase);
    assert_eq!(tc.consensus.restore_past_utxo_entry(&chain[2], &outpoint).unwrap(), Some(entry.clone()));
    assert_eq!(tc.consensus.restore_past_utxo_entry(&chain[1], &outpoint).unwrap(), None);

    let tx = spend(outpoint, subsidy - 1000);
    let immature = tc.build_with_txs(&[chain[2]], vec![tx.clone()]);
    assert_eq!(rule_error(tc.consensus.process_block(immature)), RuleError::ImmatureSpend(outpoint, 3, 4));

    let mature = tc.add_chain(chain[2], (maturity - 1) as usize);
    let tip = *mature.last().unwrap();
    assert_eq!(tc.consensus.block_info(&tip).unwrap().blue_score, entry.block_blue_score + maturity - 1);
    let spending = tc.build_with_txs(&[tip], vec![tx.clone()]);
    let spending_hash = spending.hash();
    assert_eq!(tc.submit(spending), BlockStatus::Valid);

    // The spend takes effect once a block accepts it, and its fee goes to the miner of the spending block
    let accepting = tc.build(&[spending_hash]);
    assert!(accepting.transactions[0].outputs.iter().any(|o| o.value == subsidy + 1000));
    assert_eq!(tc.submit(accepting), BlockStatus::Valid);
    assert_eq!(tc.consensus.get_utxo_entry(&outpoint).unwrap(), None);
    let created = TransactionOutpoint::new(tx.id(), 0);
    assert_eq!(tc.consensus.get_utxo_entry(&created).unwrap().unwrap().amount, subsidy - 1000);
}

/// Chain A of 52 blocks, then chain B of 60 blocks mined elsewhere, both on genesis
fn finality_conflict_setup() -> (TestConsensus, Vec<Hash>, Vec<Hash>, tokio::sync::mpsc::UnboundedReceiver<ConsensusEvent>) {
    let params = test_params(18, 50);
    let other = TestConsensus::new(params.clone());
    let branch_b = other.mine_chain(other.genesis(), 60);

    let tc = TestConsensus::new(params);
    let a = tc.add_chain(tc.genesis(), 52);
    assert_eq!(tc.consensus.last_finality_point(), a[49]);

    let events = tc.consensus.subscribe();
    let mut b = Vec::with_capacity(branch_b.len());
    for block in branch_b {
        let hash = block.hash();
        let status = tc.submit(block);
        assert!(matches!(status, BlockStatus::UTXOPendingVerification | BlockStatus::ViolatedSubjectiveFinality), "{status:?}");
        b.push(hash);
    }
    (tc, a, b, events)
}

#[test]
fn test_finality_conflict_detected() {
    let (tc, a, b, mut events) = finality_conflict_setup();
    assert_eq!(tc.consensus.selected_tip(), a[51]);
    assert_eq!(tc.consensus.last_finality_point(), a[49]);
    assert_eq!(tc.consensus.block_status(&b[59]), Some(BlockStatus::ViolatedSubjectiveFinality));
    assert_eq!(tc.consensus.block_status(&b[10]), Some(BlockStatus::UTXOPendingVerification));

    let conflicts = tc.consensus.finality_conflicts();
    assert_eq!(conflicts.len(), 1);
    assert!(conflicts[0].is_open());
    assert_eq!(conflicts[0].current_selected_tip_hash, a[51]);

    let notified: Vec<ConsensusEvent> =
        std::iter::from_fn(|| events.try_recv().ok()).filter(|e| matches!(e, ConsensusEvent::FinalityConflict { .. })).collect();
    assert_eq!(notified.len(), 1);
    match &notified[0] {
        ConsensusEvent::FinalityConflict { id, current_selected_tip, violating_block } => {
            assert_eq!(*id, conflicts[0].id);
            assert_eq!(*current_selected_tip, a[51]);
            assert_eq!(*violating_block, conflicts[0].violating_block_hash);
            let violating_score = tc.consensus.block_info(violating_block).unwrap().blue_score;
            assert!(violating_score >= 52);
        }
        _ => unreachable!(),
    }
}

#[test]
fn test_finality_conflict_resolved_by_switching() {
    let (tc, a, b, mut events) = finality_conflict_setup();
    let id = tc.consensus.finality_conflicts()[0].id;

    tc.consensus.resolve_finality_conflict(id, &[b[59]], &[a[0]]).unwrap();
    assert_eq!(tc.consensus.selected_tip(), b[59]);
    assert_eq!(tc.consensus.block_status(&b[59]), Some(BlockStatus::Valid));
    assert_eq!(tc.consensus.block_status(&a[51]), Some(BlockStatus::ManuallyRejected));
    assert_eq!(tc.consensus.last_finality_point(), b[49]);
    assert!(!tc.consensus.finality_conflicts()[0].is_open());
    assert_eq!(tc.consensus.valid_tips(), vec![b[59]]);

    let resolved = std::iter::from_fn(|| events.try_recv().ok()).any(|e| e == ConsensusEvent::FinalityConflictResolved { id, finality_point: b[49] });
    assert!(resolved);
    assert!(tc.consensus.resolve_finality_conflict(id, &[b[59]], &[a[0]]).is_err());
}

#[test]
fn test_finality_conflict_resolved_by_keeping() {
    let (tc, a, b, _events) = finality_conflict_setup();
    let id = tc.consensus.finality_conflicts()[0].id;

    assert!(matches!(
        tc.consensus.resolve_finality_conflict(id, &[b[59]], &[b[0]]),
        Err(ConsensusError::InvalidConflictResolution(_))
    ));
    tc.consensus.resolve_finality_conflict(id, &[a[51]], &[b[0]]).unwrap();
    assert_eq!(tc.consensus.selected_tip(), a[51]);
    assert_eq!(tc.consensus.last_finality_point(), a[49]);
    assert_eq!(tc.consensus.block_status(&b[59]), Some(BlockStatus::ManuallyRejected));
    assert!(matches!(tc.consensus.resolve_finality_conflict(99, &[a[51]], &[]), Err(ConsensusError::UnknownFinalityConflict(99))));
}

#[test]
fn test_rejected_branch_diffs_dropped_after_switch() {
    let (tc, a, b, _events) = finality_conflict_setup();
    let id = tc.consensus.finality_conflicts()[0].id;
    let g = tc.genesis();
    assert!(tc.consensus.read_context(|ctx| ctx.storage.utxo_diffs.is_root(&a[51])));

    tc.consensus.resolve_finality_conflict(id, &[b[59]], &[a[0]]).unwrap();
    assert_eq!(tc.consensus.last_finality_point(), b[49]);
    tc.consensus.read_context(|ctx| {
        for hash in &a {
            assert!(!ctx.storage.utxo_diffs.has_diff(hash).unwrap());
        }
        for root in ctx.storage.utxo_diffs.roots() {
            let id = ctx.index.get(root).unwrap();
            assert!(!ctx.index.status(id).is_invalid());
        }
        assert!(ctx.storage.utxo_diffs.is_root(&b[59]));
        assert!(ctx.storage.utxo_diffs.is_root(&g));
    });

    // Genesis lost its diff child but still restores to the empty set
    let coinbase = tc.consensus.get_block(&b[10]).unwrap().unwrap().transactions[0].id();
    let outpoint = TransactionOutpoint::new(coinbase, 0);
    assert!(tc.consensus.get_utxo_entry(&outpoint).unwrap().is_some());
    assert_eq!(tc.consensus.restore_past_utxo_entry(&g, &outpoint).unwrap(), None);
    assert!(tc.consensus.restore_past_utxo_entry(&b[11], &outpoint).unwrap().is_some());
}

#[test]
fn test_restart_restores_state() {
    let dir = tempfile::tempdir().unwrap();
    let params = test_params(18, 100);
    let (tips, selected_tip, virtual_blue_score, chain) = {
        let db = Arc::new(Database::open(dir.path()).unwrap());
        let config = ConsensusConfig::new(params.clone());
        let tc = TestConsensus::with_storage(params.clone(), ConsensusStorage::with_db(db, &config));
        let g = tc.genesis();
        let chain = tc.add_chain(g, 5);
        let side = tc.add(&[chain[2]]);
        assert!(tc.consensus.tips().contains(&side));
        (tc.consensus.tips(), tc.consensus.selected_tip(), tc.consensus.virtual_blue_score(), chain)
    };

    let db = Arc::new(Database::open(dir.path()).unwrap());
    let config = ConsensusConfig::new(params.clone());
    let tc = TestConsensus::with_storage(params, ConsensusStorage::with_db(db, &config));
    assert_eq!(tc.consensus.tips(), tips);
    assert_eq!(tc.consensus.selected_tip(), selected_tip);
    assert_eq!(tc.consensus.virtual_blue_score(), virtual_blue_score);
    for hash in &chain {
        assert_eq!(tc.consensus.block_status(hash), Some(BlockStatus::Valid));
    }

    // The reloaded DAG keeps growing
    let next = tc.add(&[selected_tip]);
    assert_eq!(tc.consensus.selected_tip(), next);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_finalization_runs_on_the_blocking_pool() {
    let tc = TestConsensus::new(test_params(3, 10));
    let chain = tc.add_chain(tc.genesis(), 25);
    assert_ne!(tc.consensus.last_finality_point(), tc.genesis());

    let mut finalized = false;
    for _ in 0..200 {
        if tc.consensus.block_info(&chain[0]).unwrap().is_finalized {
            finalized = true;
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    assert!(finalized);
    assert!(!tc.consensus.block_info(&chain[24]).unwrap().is_finalized);
}
