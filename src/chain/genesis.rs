//! Hard-coded genesis headers, one per network. Genesis is the chain's
//! permanent root and is never removed.

use crate::codec::Network;
use crate::primitives::{BlockHeader, CompactTarget, Hash256};

pub fn genesis_header(network: Network) -> BlockHeader {
    match network {
        Network::Mainnet => BlockHeader {
            version: 1,
            prev_hash: Hash256::ZERO,
            merkle_root: "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33"
                .parse()
                .expect("valid genesis merkle root"),
            timestamp: 1_231_006_505,
            bits: CompactTarget::new(0x1d00ffff),
            nonce: 2_083_236_893,
        },
        Network::Testnet | Network::Testnet3 => BlockHeader {
            version: 1,
            prev_hash: Hash256::ZERO,
            merkle_root: "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33"
                .parse()
                .expect("valid genesis merkle root"),
            timestamp: 1_296_688_602,
            bits: CompactTarget::new(0x1d00ffff),
            nonce: 414_098_458,
        },
        Network::Regtest => BlockHeader {
            version: 1,
            prev_hash: Hash256::ZERO,
            merkle_root: "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33"
                .parse()
                .expect("valid genesis merkle root"),
            timestamp: 1_296_688_602,
            bits: CompactTarget::new(0x207fffff),
            nonce: 2,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_genesis_hash_matches_known_value() {
        let header = genesis_header(Network::Mainnet);
        let hash = header.block_hash();
        assert_eq!(
            hash.to_hex_be(),
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26"
        );
    }
}
