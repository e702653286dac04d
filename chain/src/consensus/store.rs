//! Storage abstraction used by the chain executor.

use std::collections::HashMap;

use crate::types::{Block, BlockId};

/// A block together with the chain metadata computed when it was stored.
///
/// Height and cumulative difficulty are derived from the parent at insert
/// time; they are not part of the block's canonical encoding.
#[derive(Clone, Debug)]
pub struct StoredBlock {
    pub block: Block,
    /// Distance from genesis (genesis itself has height 0).
    pub height: u64,
    /// Sum of the difficulty targets along the path from genesis to this
    /// block, inclusive. Fork choice compares this value.
    pub total_difficulty: f64,
}

/// Abstract storage interface for the block graph.
///
/// Implementations can be backed by in-memory maps or a database. The
/// interface is intentionally small: the executor only needs get/insert,
/// id enumeration for the handshake, and a notion of the current tip.
///
/// A store always contains at least the genesis block; constructors take it
/// up front, which is why `tip` is not optional.
pub trait BlockStore {
    /// Fetches a stored block by id, if present.
    fn get(&self, id: &BlockId) -> Option<&StoredBlock>;

    /// Persists a block under its id.
    fn insert(&mut self, id: BlockId, stored: StoredBlock);

    /// Returns `true` if a block with this id is stored.
    fn contains(&self, id: &BlockId) -> bool;

    /// Removes a block by id. Used when a branch fails re-execution.
    fn remove(&mut self, id: &BlockId);

    /// Snapshot of all stored block ids, in no particular order.
    fn ids(&self) -> Vec<BlockId>;

    /// Id of the current canonical tip.
    fn tip(&self) -> BlockId;

    /// Reassigns the canonical tip.
    fn set_tip(&mut self, id: BlockId);
}

/// In-memory implementation of [`BlockStore`].
///
/// The whole block graph lives in a `HashMap`; no durability is provided.
pub struct InMemoryBlockStore {
    blocks: HashMap<BlockId, StoredBlock>,
    tip: BlockId,
}

impl InMemoryBlockStore {
    /// Creates a store seeded with the given genesis block as tip.
    pub fn with_genesis(id: BlockId, genesis: StoredBlock) -> Self {
        let mut blocks = HashMap::new();
        blocks.insert(id, genesis);
        Self { blocks, tip: id }
    }

    /// Number of blocks currently stored.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always `false`: the store holds at least genesis.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl BlockStore for InMemoryBlockStore {
    fn get(&self, id: &BlockId) -> Option<&StoredBlock> {
        self.blocks.get(id)
    }

    fn insert(&mut self, id: BlockId, stored: StoredBlock) {
        self.blocks.insert(id, stored);
    }

    fn contains(&self, id: &BlockId) -> bool {
        self.blocks.contains_key(id)
    }

    fn remove(&mut self, id: &BlockId) {
        self.blocks.remove(id);
    }

    fn ids(&self) -> Vec<BlockId> {
        self.blocks.keys().copied().collect()
    }

    fn tip(&self) -> BlockId {
        self.tip
    }

    fn set_tip(&mut self, id: BlockId) {
        self.tip = id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlockHeader, Hash256, HASH_LEN};

    fn dummy_block(prev: u8, nonce: u64) -> Block {
        Block {
            header: BlockHeader {
                previous_hash: BlockId(Hash256([prev; HASH_LEN])),
                difficulty: 1.0,
                nonce,
                timestamp: 1_700_000_000_000,
                tx_root: Hash256([0; HASH_LEN]),
            },
            transaction_ids: Vec::new(),
            transactions: Vec::new(),
        }
    }

    #[test]
    fn store_tracks_genesis_as_initial_tip() {
        let genesis = dummy_block(0, 0);
        let id = genesis.compute_id();
        let store = InMemoryBlockStore::with_genesis(
            id,
            StoredBlock {
                block: genesis,
                height: 0,
                total_difficulty: 1.0,
            },
        );

        assert_eq!(store.tip(), id);
        assert_eq!(store.len(), 1);
        assert!(store.contains(&id));
    }

    #[test]
    fn insert_and_retip() {
        let genesis = dummy_block(0, 0);
        let genesis_id = genesis.compute_id();
        let mut store = InMemoryBlockStore::with_genesis(
            genesis_id,
            StoredBlock {
                block: genesis,
                height: 0,
                total_difficulty: 1.0,
            },
        );

        let child = dummy_block(1, 7);
        let child_id = child.compute_id();
        store.insert(
            child_id,
            StoredBlock {
                block: child,
                height: 1,
                total_difficulty: 2.0,
            },
        );
        store.set_tip(child_id);

        assert_eq!(store.tip(), child_id);
        assert_eq!(store.get(&child_id).expect("stored").height, 1);
        assert_eq!(store.ids().len(), 2);
    }
}
