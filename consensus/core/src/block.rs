use serde::{Deserialize, Serialize};

use crate::header::Header;
use crate::tx::Transaction;
use crate::wire::{WireReader, WireResult, WireSink};
use crate::Hash;

/// Complete block structure including header and transactions
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block header containing metadata and parent information
    pub header: Header,
    /// List of transactions in the block, coinbase first
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Creates a new block with the given header and transactions
    pub fn new(header: Header, transactions: Vec<Transaction>) -> Self {
        Self { header, transactions }
    }

    pub fn hash(&self) -> Hash {
        self.header.hash
    }

    pub fn is_genesis(&self) -> bool {
        self.header.is_genesis()
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first().filter(|tx| tx.is_coinbase())
    }

    pub fn encode_to<S: WireSink>(&self, sink: &mut S) {
        self.header.encode_to(sink);
        sink.put_var_int(self.transactions.len() as u64);
        for tx in &self.transactions {
            tx.encode_to(sink, true);
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_to(&mut buf);
        buf
    }

    /// Decodes a full block, rejecting trailing bytes
    pub fn from_bytes(bytes: &[u8]) -> WireResult<Self> {
        let mut reader = WireReader::new(bytes);
        let header = Header::decode_from(&mut reader)?;
        let tx_count = reader.read_count(60)?;
        let mut transactions = Vec::with_capacity(tx_count);
        for _ in 0..tx_count {
            transactions.push(Transaction::decode_from(&mut reader)?);
        }
        reader.finish()?;
        Ok(Self { header, transactions })
    }
}
