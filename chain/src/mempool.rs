//! Pending-transaction pool and gossip inventory.
//!
//! The mempool holds validated-but-unconfirmed transactions in insertion
//! order; block assembly iterates a snapshot of that order. There is no
//! fee-based prioritisation, deliberately. The inventory side tracks block
//! ids this node has already seen so re-delivered gossip is dropped without
//! touching the executor.

use std::collections::{HashMap, HashSet};

use crate::types::{BlockId, Transaction, TxId};

/// A pooled transaction together with its canonical bytes.
///
/// The raw bytes are kept so that assembly can size candidates and fill
/// block bodies without re-encoding.
#[derive(Clone, Debug)]
pub struct PoolEntry {
    pub tx: Transaction,
    pub raw: Vec<u8>,
}

/// Pending transactions plus the seen-block-id set.
#[derive(Debug, Default)]
pub struct Mempool {
    entries: HashMap<TxId, PoolEntry>,
    /// Insertion order of the ids in `entries`.
    order: Vec<TxId>,
    known_blocks: HashSet<BlockId>,
}

impl Mempool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending transactions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no transactions are pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if the transaction is already pooled.
    pub fn contains(&self, id: &TxId) -> bool {
        self.entries.contains_key(id)
    }

    /// Inserts a transaction if its id is not already present.
    ///
    /// Returns `false` on a duplicate; this is a no-op, not an error.
    pub fn add(&mut self, id: TxId, tx: Transaction, raw: Vec<u8>) -> bool {
        if self.entries.contains_key(&id) {
            return false;
        }
        self.entries.insert(id, PoolEntry { tx, raw });
        self.order.push(id);
        true
    }

    /// Evicts the given ids (confirmed or invalidated entries).
    ///
    /// Unknown ids are ignored.
    pub fn remove(&mut self, ids: &[TxId]) {
        for id in ids {
            self.entries.remove(id);
        }
        self.order.retain(|id| self.entries.contains_key(id));
    }

    /// Snapshot of the pool in insertion order.
    ///
    /// Assembly filters this copy instead of iterating the live pool, so
    /// the pool can change underneath a mining round without invalidating
    /// anything.
    pub fn snapshot(&self) -> Vec<(TxId, PoolEntry)> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).map(|e| (*id, e.clone())))
            .collect()
    }

    /// Records a block id as seen. Returns `false` if it already was.
    pub fn mark_block_known(&mut self, id: BlockId) -> bool {
        self.known_blocks.insert(id)
    }

    /// Returns `true` if the block id has been seen before.
    pub fn is_block_known(&self, id: &BlockId) -> bool {
        self.known_blocks.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Hash256, OutEntry, HASH_LEN};

    fn dummy_tx(byte: u8) -> (TxId, Transaction, Vec<u8>) {
        let tx = Transaction {
            timestamp: byte as u64,
            inputs: Vec::new(),
            outputs: vec![OutEntry {
                recipient: crate::types::Address(Hash256([byte; HASH_LEN])),
                amount: byte as u64,
            }],
        };
        let raw = tx.canonical_bytes();
        (tx.compute_id(), tx, raw)
    }

    #[test]
    fn duplicate_add_is_a_no_op() {
        let mut pool = Mempool::new();
        let (id, tx, raw) = dummy_tx(1);

        assert!(pool.add(id, tx.clone(), raw.clone()));
        assert!(!pool.add(id, tx, raw));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn snapshot_preserves_insertion_order() {
        let mut pool = Mempool::new();
        let mut ids = Vec::new();
        for byte in [3u8, 1, 7, 5] {
            let (id, tx, raw) = dummy_tx(byte);
            pool.add(id, tx, raw);
            ids.push(id);
        }

        let snapshot: Vec<TxId> = pool.snapshot().into_iter().map(|(id, _)| id).collect();
        assert_eq!(snapshot, ids);
    }

    #[test]
    fn remove_evicts_and_keeps_order() {
        let mut pool = Mempool::new();
        let mut ids = Vec::new();
        for byte in 1..=4u8 {
            let (id, tx, raw) = dummy_tx(byte);
            pool.add(id, tx, raw);
            ids.push(id);
        }

        pool.remove(&[ids[1], ids[2]]);

        let snapshot: Vec<TxId> = pool.snapshot().into_iter().map(|(id, _)| id).collect();
        assert_eq!(snapshot, vec![ids[0], ids[3]]);

        // Removing an unknown id is fine.
        pool.remove(&[ids[1]]);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn known_block_ids_deduplicate() {
        let mut pool = Mempool::new();
        let id = BlockId(Hash256([9; HASH_LEN]));

        assert!(!pool.is_block_known(&id));
        assert!(pool.mark_block_known(id));
        assert!(!pool.mark_block_known(id));
        assert!(pool.is_block_known(&id));
    }
}
