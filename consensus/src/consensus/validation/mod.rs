//! Block, header and transaction validation
//!
//! The validator structs hold context-free rules; `contextual` checks a block
//! against the DAG it is being inserted into.

pub mod block_validator;
pub mod contextual;
pub mod header_validator;
pub mod transaction_validator;

pub use block_validator::BlockValidator;
pub use header_validator::HeaderValidator;
pub use transaction_validator::{check_tx_finality, AcceptingContext, ConnectedTx, TransactionValidator};
