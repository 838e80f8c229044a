use jio_utils::hex::ToHex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::OP_RETURN;

/// Locking script of an output. Opaque to consensus apart from its length
/// (which feeds mass) and the unspendable `OP_RETURN` prefix.
#[derive(Default, PartialEq, Eq, Clone, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScriptPublicKey(Vec<u8>);

impl ScriptPublicKey {
    pub fn new(script: Vec<u8>) -> Self {
        Self(script)
    }

    pub fn script(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_provably_unspendable(&self) -> bool {
        self.0.first() == Some(&OP_RETURN)
    }
}

impl From<Vec<u8>> for ScriptPublicKey {
    fn from(script: Vec<u8>) -> Self {
        Self(script)
    }
}

impl From<&[u8]> for ScriptPublicKey {
    fn from(script: &[u8]) -> Self {
        Self(script.to_vec())
    }
}

impl fmt::Debug for ScriptPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScriptPublicKey({})", self.0.to_hex())
    }
}
