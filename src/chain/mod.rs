//! The header chain engine: an append-only, reorg-capable forest of
//! headers rooted at a hard-coded genesis, tracking cumulative work and
//! exposing the active tip.

pub mod engine;
pub mod genesis;

pub use engine::{AddOutcome, ChainEngine, ChainEvent, ChainNode};
pub use genesis::genesis_header;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Network;
    use crate::primitives::{BlockHeader, CompactTarget, Hash256};
    use std::sync::{Arc, Mutex};

    /// An easy target so tests can mine headers without a real PoW search.
    const EASY_BITS: u32 = 0x207f_ffff;

    fn child_of(parent: &BlockHeader, nonce_seed: u32) -> BlockHeader {
        let parent_hash = parent.block_hash();
        let mut nonce = nonce_seed;
        loop {
            let candidate = BlockHeader {
                version: 1,
                prev_hash: parent_hash,
                merkle_root: Hash256::double_sha256(&nonce.to_le_bytes()),
                timestamp: parent.timestamp + 1,
                bits: CompactTarget::new(EASY_BITS),
                nonce,
            };
            let hash = candidate.block_hash();
            if hash.as_uint256_le() <= candidate.bits.decode().unwrap() {
                return candidate;
            }
            nonce = nonce.wrapping_add(1);
        }
    }

    #[test]
    fn genesis_only_chain_has_height_zero() {
        let engine = ChainEngine::new(Network::Regtest);
        assert_eq!(engine.height(), 0);
        let locator = engine.get_known_hashes(10);
        assert_eq!(locator, vec![engine.genesis_hash()]);
    }

    #[test]
    fn linear_chain_extends_tip_and_height() {
        let mut engine = ChainEngine::new(Network::Regtest);
        let genesis = engine.get(&engine.tip_hash()).unwrap().clone();
        let mut prev = genesis.header;
        for i in 0..3 {
            let h = child_of(&prev, i);
            assert_eq!(engine.add(None, h).unwrap(), AddOutcome::Added);
            prev = h;
        }
        assert_eq!(engine.height(), 3);
        assert_eq!(engine.tip_hash(), prev.block_hash());
    }

    #[test]
    fn unknown_parent_is_queued_pending() {
        let mut engine = ChainEngine::new(Network::Regtest);
        let genesis = engine.get(&engine.tip_hash()).unwrap().clone();
        let a1 = child_of(&genesis.header, 0);
        let a2 = child_of(&a1, 0);
        // insert a2 before a1: a1 is unknown, so a2 is pending
        assert_eq!(engine.add(None, a2).unwrap(), AddOutcome::Pending);
        assert_eq!(engine.height(), 0);
        // now insert a1; a2 should reconnect automatically
        assert_eq!(engine.add(None, a1).unwrap(), AddOutcome::Added);
        assert_eq!(engine.height(), 2);
        assert_eq!(engine.tip_hash(), a2.block_hash());
    }

    #[test]
    fn duplicate_insert_is_reported_not_rejected() {
        let mut engine = ChainEngine::new(Network::Regtest);
        let genesis = engine.get(&engine.tip_hash()).unwrap().clone();
        let a1 = child_of(&genesis.header, 0);
        engine.add(None, a1).unwrap();
        assert_eq!(engine.add(None, a1).unwrap(), AddOutcome::Duplicate);
    }

    #[test]
    fn reorg_emits_strictly_ordered_callbacks() {
        let mut engine = ChainEngine::new(Network::Regtest);
        let genesis = engine.get(&engine.tip_hash()).unwrap().clone();

        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = Arc::clone(&events);
        engine.register_observer(move |event| {
            events_clone.lock().unwrap().push(event.clone());
        });

        let a1 = child_of(&genesis.header, 0);
        let a2 = child_of(&a1, 0);
        let a3 = child_of(&a2, 0);
        for h in [a1, a2, a3] {
            engine.add(None, h).unwrap();
        }
        assert_eq!(engine.tip_hash(), a3.block_hash());
        events.lock().unwrap().clear();

        let b1 = child_of(&genesis.header, 1000);
        let b2 = child_of(&b1, 1000);
        let b3 = child_of(&b2, 1000);
        let b4 = child_of(&b3, 1000);
        for h in [b1, b2, b3, b4] {
            engine.add(None, h).unwrap();
        }

        assert_eq!(engine.tip_hash(), b4.block_hash());
        assert_eq!(engine.height(), 4);

        let recorded = events.lock().unwrap();
        let kinds: Vec<&str> = recorded
            .iter()
            .map(|e| match e {
                ChainEvent::Add(_, _, _) => "add",
                ChainEvent::Remove(_, _) => "remove",
            })
            .collect();
        // removals must all precede additions
        let first_add = kinds.iter().position(|k| *k == "add").unwrap();
        assert!(kinds[..first_add].iter().all(|k| *k == "remove"));
    }

    #[test]
    fn genesis_cannot_be_removed() {
        let mut engine = ChainEngine::new(Network::Regtest);
        let g = engine.genesis_hash();
        assert!(engine.remove(&g).is_err());
    }

    #[test]
    fn locator_spacing_matches_dense_prefix_then_doubling() {
        let mut engine = ChainEngine::new(Network::Regtest);
        let genesis = engine.get(&engine.tip_hash()).unwrap().clone();
        let mut prev = genesis.header;
        let mut chain = vec![genesis.header.block_hash()];
        for i in 0..45 {
            let h = child_of(&prev, i);
            engine.add(None, h).unwrap();
            chain.push(h.block_hash());
            prev = h;
        }

        let locator = engine.get_known_hashes(100);
        let tip_height = chain.len() - 1;
        // first 10 consecutive from the tip, then gaps of 2, 4, 8, 16
        let expected_offsets = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 11, 15, 23, 39];
        let expected: Vec<Hash256> = expected_offsets
            .iter()
            .map(|off| chain[tip_height - off])
            .collect();
        assert_eq!(&locator[..expected.len()], &expected[..]);
    }
}
