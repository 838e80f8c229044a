use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of a subnetwork ID in bytes
pub const SUBNETWORK_ID_SIZE: usize = 20;

const fn builtin(first: u8) -> SubnetworkId {
    let mut bytes = [0u8; SUBNETWORK_ID_SIZE];
    bytes[0] = first;
    SubnetworkId(bytes)
}

/// Subnetwork of ordinary value transfers
pub const SUBNETWORK_ID_NATIVE: SubnetworkId = builtin(0);

/// Subnetwork reserved for the coinbase transaction
pub const SUBNETWORK_ID_COINBASE: SubnetworkId = builtin(1);

/// Subnetwork reserved for subnetwork registration
pub const SUBNETWORK_ID_REGISTRY: SubnetworkId = builtin(2);

/// Identifies the subnetwork a transaction belongs to. Ordering is byte-lexicographic,
/// which is the order non-coinbase transactions must follow inside a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SubnetworkId([u8; SUBNETWORK_ID_SIZE]);

impl SubnetworkId {
    pub const fn from_bytes(bytes: [u8; SUBNETWORK_ID_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SUBNETWORK_ID_SIZE] {
        &self.0
    }

    pub fn is_native(&self) -> bool {
        *self == SUBNETWORK_ID_NATIVE
    }

    /// Native, coinbase and registry are built in; they never carry gas
    pub fn is_builtin(&self) -> bool {
        *self == SUBNETWORK_ID_COINBASE || *self == SUBNETWORK_ID_REGISTRY
    }

    pub fn is_builtin_or_native(&self) -> bool {
        self.is_native() || self.is_builtin()
    }
}

impl fmt::Display for SubnetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_ordering() {
        assert!(SUBNETWORK_ID_NATIVE < SUBNETWORK_ID_COINBASE);
        assert!(SUBNETWORK_ID_COINBASE < SUBNETWORK_ID_REGISTRY);
        assert!(SUBNETWORK_ID_REGISTRY.is_builtin());
        assert!(!SUBNETWORK_ID_NATIVE.is_builtin());
        assert!(SubnetworkId::from_bytes([7; SUBNETWORK_ID_SIZE]) > SUBNETWORK_ID_REGISTRY);
    }
}
