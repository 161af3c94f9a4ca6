//! The header chain engine: insertion, proof-of-work validation, orphan
//! reconnection, reorg, and locator construction.

use std::collections::HashMap;
use std::sync::Arc;

use crypto_bigint::U256;
use tracing::{debug, info, warn};

use crate::codec::Network;
use crate::error::{NodeError, Result};
use crate::primitives::compact::work_from_bits;
use crate::primitives::{BlockHeader, BlockHeaderRecord, Hash256};
use crate::storage::{HeaderStore, PutOutcome};

/// First N hashes in a locator are consecutive from the tip before the
/// step starts doubling.
const LOCATOR_DENSE_PREFIX: usize = 10;

#[derive(Debug, Clone)]
pub struct ChainNode {
    pub hash: Hash256,
    pub parent_hash: Hash256,
    pub header: BlockHeader,
    pub height: u32,
    pub cumulative_work: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    Duplicate,
    /// Parent not yet known; queued for later reconnection.
    Pending,
}

/// Events emitted by the engine to registered observers, in the exact
/// order described by the reorg algorithm: all removals (tip-down),
/// then all additions (LCA-up).
#[derive(Debug, Clone)]
pub enum ChainEvent {
    Add(Hash256, u32, BlockHeader),
    Remove(Hash256, u32),
}

type Observer = Box<dyn FnMut(&ChainEvent) + Send>;

pub struct ChainEngine {
    genesis_hash: Hash256,
    nodes: HashMap<Hash256, ChainNode>,
    tip: Hash256,
    /// Headers buffered because their parent isn't known yet, keyed by
    /// the missing parent hash.
    orphans: HashMap<Hash256, Vec<BlockHeader>>,
    store: Option<Arc<HeaderStore>>,
    observers: Vec<Observer>,
}

impl ChainEngine {
    pub fn new(network: Network) -> Self {
        Self::with_store(network, None)
    }

    pub fn with_store(network: Network, store: Option<Arc<HeaderStore>>) -> Self {
        let genesis = super::genesis::genesis_header(network);
        let genesis_hash = genesis.block_hash();
        let genesis_node = ChainNode {
            hash: genesis_hash,
            parent_hash: Hash256::ZERO,
            header: genesis,
            height: 0,
            cumulative_work: work_from_bits(&genesis.bits),
        };
        let mut nodes = HashMap::new();
        nodes.insert(genesis_hash, genesis_node);

        if let Some(store) = &store {
            let record = BlockHeaderRecord::new(0, genesis);
            if let Err(e) = store.put(&genesis_hash, &record) {
                warn!(error = %e, "failed to persist genesis header");
            }
        }

        ChainEngine { genesis_hash, nodes, tip: genesis_hash, orphans: HashMap::new(), store, observers: Vec::new() }
    }

    pub fn register_observer(&mut self, observer: impl FnMut(&ChainEvent) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn genesis_hash(&self) -> Hash256 {
        self.genesis_hash
    }

    pub fn tip_hash(&self) -> Hash256 {
        self.tip
    }

    pub fn height(&self) -> u32 {
        self.nodes.get(&self.tip).map(|n| n.height).unwrap_or(0)
    }

    pub fn get(&self, hash: &Hash256) -> Option<&ChainNode> {
        self.nodes.get(hash)
    }

    pub fn contains(&self, hash: &Hash256) -> bool {
        self.nodes.contains_key(hash)
    }

    /// Insert a new header, computing its hash if not supplied.
    pub fn add(&mut self, hash: Option<Hash256>, header: BlockHeader) -> Result<AddOutcome> {
        let hash = hash.unwrap_or_else(|| header.block_hash());

        if self.nodes.contains_key(&hash) {
            return Ok(AddOutcome::Duplicate);
        }

        self.validate_pow(&hash, &header)?;

        if !self.nodes.contains_key(&header.prev_hash) {
            debug!(hash = %hash, parent = %header.prev_hash, "queueing orphan header");
            self.orphans.entry(header.prev_hash).or_default().push(header);
            return Ok(AddOutcome::Pending);
        }

        self.connect(hash, header)?;
        self.reconnect_orphans(hash);
        Ok(AddOutcome::Added)
    }

    fn validate_pow(&self, hash: &Hash256, header: &BlockHeader) -> Result<()> {
        let Some(target) = header.bits.decode() else {
            return Err(NodeError::InvalidProofOfWork { hash: hash.to_string() });
        };
        if hash.as_uint256_le() > target {
            return Err(NodeError::InvalidProofOfWork { hash: hash.to_string() });
        }
        Ok(())
    }

    /// Attach a header whose parent is already known, then decide whether
    /// this triggers a reorg.
    fn connect(&mut self, hash: Hash256, header: BlockHeader) -> Result<()> {
        let parent = self
            .nodes
            .get(&header.prev_hash)
            .ok_or_else(|| NodeError::UnknownParent { hash: hash.to_string(), parent: header.prev_hash.to_string() })?
            .clone();

        let height = parent.height + 1;
        let work = work_from_bits(&header.bits);
        let (cumulative_work, _) = parent.cumulative_work.adc(&work, crypto_bigint::Limb::ZERO);

        let node = ChainNode { hash, parent_hash: header.prev_hash, header, height, cumulative_work };
        self.nodes.insert(hash, node);

        let current_tip_work = self.nodes[&self.tip].cumulative_work;
        if cumulative_work > current_tip_work {
            self.reorg_to(hash)?;
        } else {
            self.emit(ChainEvent::Add(hash, height, header));
        }
        Ok(())
    }

    fn reconnect_orphans(&mut self, parent_hash: Hash256) {
        let Some(pending) = self.orphans.remove(&parent_hash) else { return };
        for header in pending {
            let hash = header.block_hash();
            if self.nodes.contains_key(&hash) {
                continue;
            }
            if let Err(e) = self.connect(hash, header) {
                warn!(error = %e, hash = %hash, "failed to reconnect orphan");
                continue;
            }
            self.reconnect_orphans(hash);
        }
    }

    /// Reorganize the active chain to `new_tip`: walk both branches back
    /// to their lowest common ancestor, then emit removals tip-down on
    /// the old branch followed by additions LCA-up on the new branch.
    fn reorg_to(&mut self, new_tip: Hash256) -> Result<()> {
        let old_tip = self.tip;
        if old_tip == new_tip {
            return Ok(());
        }

        let mut old_path = Vec::new();
        let mut cur = old_tip;
        let mut old_ancestors = HashMap::new();
        loop {
            old_ancestors.insert(cur, old_path.len());
            old_path.push(cur);
            let node = &self.nodes[&cur];
            if cur == self.genesis_hash {
                break;
            }
            cur = node.parent_hash;
        }

        let mut new_path = Vec::new();
        let mut cur = new_tip;
        let lca = loop {
            if let Some(_idx) = old_ancestors.get(&cur) {
                break cur;
            }
            new_path.push(cur);
            let node = &self.nodes[&cur];
            cur = node.parent_hash;
        };

        // Old branch from old_tip down to (but not including) lca, in
        // descending (tip-first) order.
        for hash in &old_path {
            if *hash == lca {
                break;
            }
            let height = self.nodes[hash].height;
            self.emit(ChainEvent::Remove(*hash, height));
        }

        // New branch from lca+1 up to new_tip, ascending order.
        for hash in new_path.iter().rev() {
            let node = &self.nodes[hash];
            self.emit(ChainEvent::Add(*hash, node.height, node.header));
        }

        self.tip = new_tip;
        info!(old_tip = %old_tip, new_tip = %new_tip, lca = %lca, "chain reorganized");
        Ok(())
    }

    fn emit(&mut self, event: ChainEvent) {
        match &event {
            ChainEvent::Add(hash, height, header) => {
                if let Some(store) = &self.store {
                    let record = BlockHeaderRecord::new(*height, *header);
                    match store.put(hash, &record) {
                        Ok(PutOutcome::Inserted) => {}
                        Ok(PutOutcome::Updated) => {}
                        Err(e) => warn!(error = %e, "store put failed during chain callback"),
                    }
                }
            }
            ChainEvent::Remove(hash, _height) => {
                if let Some(store) = &self.store {
                    if let Err(e) = store.del(hash) {
                        warn!(error = %e, "store del failed during chain callback");
                    }
                }
            }
        }
        for observer in &mut self.observers {
            observer(&event);
        }
    }

    /// Remove a single node. Permitted only on orphan (non-active-chain)
    /// branches; genesis and active-chain nodes are protected.
    pub fn remove(&mut self, hash: &Hash256) -> Result<()> {
        if *hash == self.genesis_hash {
            return Err(NodeError::CannotRemoveGenesis);
        }
        if self.is_on_active_chain(hash) {
            return Err(NodeError::NotAnOrphan(hash.to_string()));
        }
        self.nodes.remove(hash);
        Ok(())
    }

    fn is_on_active_chain(&self, hash: &Hash256) -> bool {
        let mut cur = self.tip;
        loop {
            if cur == *hash {
                return true;
            }
            if cur == self.genesis_hash {
                return false;
            }
            match self.nodes.get(&cur) {
                Some(node) => cur = node.parent_hash,
                None => return false,
            }
        }
    }

    /// Block locator: consecutive hashes from the tip for the first
    /// `LOCATOR_DENSE_PREFIX` entries, then exponentially doubling
    /// spacing back to genesis, capped at `limit` entries.
    pub fn get_known_hashes(&self, limit: usize) -> Vec<Hash256> {
        let mut out = Vec::new();
        let mut cur = self.tip;
        let mut step = 1usize;

        loop {
            out.push(cur);
            if out.len() >= limit || cur == self.genesis_hash {
                break;
            }
            if out.len() >= LOCATOR_DENSE_PREFIX {
                step *= 2;
            }

            let mut next = cur;
            for _ in 0..step {
                if next == self.genesis_hash {
                    break;
                }
                let Some(node) = self.nodes.get(&next) else { break };
                next = node.parent_hash;
            }
            if next == cur {
                break;
            }
            cur = next;
        }
        out
    }
}
