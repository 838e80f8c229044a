use crate::block::Block;
use crate::coinbase::{build_coinbase_transaction, CoinbasePayload};
use crate::config::params::Params;
use crate::constants::BLOCK_VERSION;
use crate::header::Header;
use crate::merkle::calc_hash_merkle_root;
use crate::tx::ScriptPublicKey;
use crate::ZERO_HASH;

const GENESIS_EXTRA_DATA: &[u8] = b"jio genesis";

/// Deterministic genesis block of the network described by `params`.
///
/// The coinbase pays nothing and the UTXO set after genesis is empty, so the
/// UTXO commitment is the empty-multiset commitment (the zero hash).
pub fn build_genesis(params: &Params) -> Block {
    let payload = CoinbasePayload::new(0, ScriptPublicKey::default(), GENESIS_EXTRA_DATA.to_vec());
    let coinbase = build_coinbase_transaction(&payload, vec![]);
    let header = Header::new_finalized(
        BLOCK_VERSION,
        vec![],
        calc_hash_merkle_root([&coinbase]),
        ZERO_HASH,
        ZERO_HASH,
        params.genesis_timestamp,
        params.pow_max_bits,
        params.genesis_nonce,
    );
    Block::new(header, vec![coinbase])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkType;

    #[test]
    fn test_genesis_is_deterministic_per_network() {
        let a = build_genesis(&Params::mainnet());
        let b = build_genesis(&Params::mainnet());
        assert_eq!(a.hash(), b.hash());
        assert!(a.is_genesis());
        assert!(a.transactions[0].outputs.is_empty());

        let hashes: std::collections::HashSet<_> =
            NetworkType::iter().map(|net| build_genesis(&Params::for_network(net)).hash()).collect();
        // Devnet and simnet share genesis parameters
        assert_eq!(hashes.len(), 3);
    }
}
