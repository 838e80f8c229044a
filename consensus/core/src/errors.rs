use crate::tx::{TransactionId, TransactionOutpoint};
use crate::Hash;
use thiserror::Error;

/// Consensus rule violations. A block failing any of these is invalid and is
/// never retried; the error is reported verbatim so the sender can be penalized.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("block {0} already exists")]
    DuplicateBlock(Hash),

    #[error("block {0} is an orphan and orphans are not allowed")]
    OrphanBlockNotAllowed(Hash),

    #[error("block {0} is delayed and delayed blocks are not allowed")]
    DelayedBlockNotAllowed(Hash),

    #[error("parent {0} is unknown")]
    UnknownParent(Hash),

    #[error("parent {0} is invalid")]
    InvalidAncestor(Hash),

    #[error("block has no parents")]
    NoParents,

    #[error("parents are not sorted by hash or contain duplicates")]
    WrongParentsOrder,

    #[error("block has {0} parents, the maximum is {1}")]
    TooManyParents(usize, usize),

    #[error("parent {0} is an ancestor of parent {1}")]
    InvalidParentsRelation(Hash, Hash),

    #[error("unexpected difficulty bits {bits:#010x}: {reason}")]
    UnexpectedDifficulty { bits: u32, reason: String },

    #[error("block timestamp {0} is not after past median time {1}")]
    TimeTooOld(i64, i64),

    #[error("block hash {0} is higher than its target")]
    HighHash(Hash),

    #[error("merkle root mismatch: header has {0}, computed {1}")]
    BadMerkleRoot(Hash, Hash),

    #[error("utxo commitment mismatch: header has {0}, computed {1}")]
    BadUTXOCommitment(Hash, Hash),

    #[error("block contains no transactions")]
    NoTransactions,

    #[error("duplicate transaction {0}")]
    DuplicateTx(TransactionId),

    #[error("outpoint {0} is spent more than once in the block")]
    DoubleSpend(TransactionOutpoint),

    #[error("outpoint {0} spends an output created in the same block")]
    ChainedTransactions(TransactionOutpoint),

    #[error("transaction {0} has no inputs")]
    NoTxInputs(TransactionId),

    #[error("transaction {0} spends the same outpoint twice")]
    DuplicateTxInputs(TransactionId),

    #[error("transaction {0} has bad output value: {1}")]
    BadTxOutValue(TransactionId, String),

    #[error("bad coinbase transaction: {0}")]
    BadCoinbaseTransaction(String),

    #[error("coinbase payload length {0} exceeds the maximum {1}")]
    BadCoinbasePayloadLen(usize, usize),

    #[error("malformed coinbase payload: {0}")]
    BadCoinbasePayload(String),

    #[error("transaction {0} payload hash does not match its payload")]
    InvalidPayloadHash(TransactionId),

    #[error("transaction {0} has invalid gas")]
    InvalidGas(TransactionId),

    #[error("transaction {0} has an invalid payload")]
    InvalidPayload(TransactionId),

    #[error("transaction {0} has an invalid subnetwork")]
    InvalidSubnetwork(TransactionId),

    #[error("first transaction is not a coinbase")]
    FirstTxNotCoinbase,

    #[error("block contains a second coinbase at index {0}")]
    MultipleCoinbases(usize),

    #[error("transactions are not sorted by subnetwork")]
    TransactionsNotSorted,

    #[error("block mass {0} exceeds the maximum {1}")]
    BlockMassTooHigh(u64, u64),

    #[error("transaction {0} mass {1} exceeds the maximum {2}")]
    TxMassTooHigh(TransactionId, u64, u64),

    #[error("outpoint {0} is missing from the utxo set")]
    MissingTxOut(TransactionOutpoint),

    #[error("outpoint {0} spends an immature coinbase output (created at {1}, now {2})")]
    ImmatureSpend(TransactionOutpoint, u64, u64),

    #[error("transaction {0} spends too much: {1}")]
    SpendTooHigh(TransactionId, String),

    #[error("transaction {0} outputs {1} exceed inputs {2}")]
    BadFees(TransactionId, u64, u64),

    #[error("transaction {0} is not finalized: {1}")]
    UnfinalizedTx(TransactionId, String),

    #[error("transaction output {0} already exists")]
    OverwriteTx(TransactionOutpoint),

    #[error("merge set size {0} exceeds the limit {1}")]
    ViolatingMergeLimit(u64, u64),

    #[error("red block {0} violates bounded merge depth")]
    ViolatingBoundedMergeDepth(Hash),

    #[error("block {0} violates finality")]
    FinalityViolation(Hash),

    #[error("script validation failed for input {0}: {1}")]
    ScriptValidation(TransactionOutpoint, String),
}

pub type RuleResult<T> = std::result::Result<T, RuleError>;
