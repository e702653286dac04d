// chain/src/types/block.rs

//! Block types, hashing, and the proof-of-work difficulty score.
//!
//! A block's id is the BLAKE3-256 digest of its *header's* canonical
//! bincode-2 encoding; transaction content is bound to the id through the
//! transaction root hash in the header. This lets the nonce search rehash
//! only the header per iteration while still committing to the full
//! transaction sequence.

use serde::{Deserialize, Serialize};

use super::tx::TxId;
use super::Hash256;

/// Strongly-typed block id.
///
/// The content hash of a [`BlockHeader`], computed over its canonical
/// bincode-2 serialization.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BlockId(pub Hash256);

impl BlockId {
    /// Numeric proof-of-work score of this id.
    ///
    /// The first eight bytes of the id are interpreted as a big-endian
    /// integer `prefix`; the score is `64 - log2(prefix + 1)`. Smaller
    /// prefixes (more leading zero bits) score higher. The score is a pure
    /// function of the id and identical on every node.
    ///
    /// A block id is valid proof of work iff its score **strictly**
    /// exceeds the block's target difficulty.
    pub fn difficulty_score(&self) -> f64 {
        let mut prefix_bytes = [0u8; 8];
        prefix_bytes.copy_from_slice(&self.0.as_bytes()[..8]);
        let prefix = u64::from_be_bytes(prefix_bytes);
        64.0 - (((prefix as u128) + 1) as f64).log2()
    }
}

/// Block header: the fields covered by the proof-of-work digest.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Id of the parent block in the chain.
    pub previous_hash: BlockId,

    /// Target difficulty score this block's id must strictly exceed.
    pub difficulty: f64,

    /// Nonce varied by the miner during the search.
    pub nonce: u64,

    /// Wall-clock timestamp, in milliseconds since Unix epoch, stamped by
    /// the miner on each search iteration.
    pub timestamp: u64,

    /// Digest over the ordered transaction id sequence of the block.
    pub tx_root: Hash256,
}

impl BlockHeader {
    /// Returns the canonical byte representation of this header.
    ///
    /// # Panics
    ///
    /// Panics if encoding fails. This is considered a programming
    /// error, because all fields are required to be serializable.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let cfg = bincode::config::standard();
        bincode::serde::encode_to_vec(self, cfg)
            .expect("BlockHeader should always be serializable with bincode 2 + serde")
    }

    /// Computes the canonical block id for this header.
    ///
    /// This must remain stable across nodes for consensus to work.
    pub fn compute_id(&self) -> BlockId {
        BlockId(Hash256::compute(&self.canonical_bytes()))
    }
}

/// Block = header + the ordered transaction sequence it commits to.
///
/// `transaction_ids` and `transactions` (raw canonical bytes) are parallel,
/// ordered sequences; the header's `tx_root` must equal
/// [`Block::compute_tx_root`] over `transaction_ids`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    /// Header carrying linkage, target, and the transaction root.
    pub header: BlockHeader,
    /// Ordered ids of the transactions included in this block.
    pub transaction_ids: Vec<TxId>,
    /// Ordered raw canonical encodings of the included transactions.
    pub transactions: Vec<Vec<u8>>,
}

impl Block {
    /// Returns the canonical byte representation of the whole block.
    ///
    /// This is the wire form used for gossip; the id is computed over the
    /// header alone (see [`BlockHeader::compute_id`]).
    ///
    /// # Panics
    ///
    /// Panics if encoding fails. This is considered a programming
    /// error, because all fields are required to be serializable.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let cfg = bincode::config::standard();
        bincode::serde::encode_to_vec(self, cfg)
            .expect("Block should always be serializable with bincode 2 + serde")
    }

    /// Decodes a block from its canonical bytes.
    ///
    /// Returns `None` on malformed input; gossip payloads are untrusted.
    pub fn decode(bytes: &[u8]) -> Option<Block> {
        let cfg = bincode::config::standard();
        let (block, read): (Block, usize) =
            bincode::serde::decode_from_slice(bytes, cfg).ok()?;
        if read != bytes.len() {
            return None;
        }
        Some(block)
    }

    /// Computes the canonical id of this block (header digest).
    pub fn compute_id(&self) -> BlockId {
        self.header.compute_id()
    }

    /// Digest over an ordered transaction id sequence.
    ///
    /// The ids are encoded with the canonical bincode-2 config, so
    /// reordering the sequence changes the root.
    pub fn compute_tx_root(ids: &[TxId]) -> Hash256 {
        let cfg = bincode::config::standard();
        let bytes = bincode::serde::encode_to_vec(ids, cfg)
            .expect("TxId sequence should always be serializable with bincode 2 + serde");
        Hash256::compute(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::super::HASH_LEN;
    use super::*;

    fn dummy_hash(byte: u8) -> Hash256 {
        Hash256([byte; HASH_LEN])
    }

    fn dummy_header() -> BlockHeader {
        BlockHeader {
            previous_hash: BlockId(dummy_hash(1)),
            difficulty: 8.0,
            nonce: 42,
            timestamp: 1_700_000_000_000,
            tx_root: dummy_hash(2),
        }
    }

    #[test]
    fn block_id_is_deterministic() {
        let header = dummy_header();
        assert_eq!(header.compute_id(), header.compute_id());

        let mut other = dummy_header();
        other.nonce += 1;
        assert_ne!(header.compute_id(), other.compute_id());
    }

    #[test]
    fn tx_root_is_order_sensitive() {
        let a = TxId(dummy_hash(1));
        let b = TxId(dummy_hash(2));

        let forward = Block::compute_tx_root(&[a, b]);
        let reversed = Block::compute_tx_root(&[b, a]);

        assert_ne!(forward, reversed);
        assert_eq!(forward, Block::compute_tx_root(&[a, b]));
    }

    #[test]
    fn difficulty_score_rewards_leading_zeros() {
        let all_zero = BlockId(Hash256([0u8; HASH_LEN]));
        let all_ones = BlockId(Hash256([0xff; HASH_LEN]));

        assert_eq!(all_zero.difficulty_score(), 64.0);
        assert!(all_ones.difficulty_score() < 1e-9);

        // One leading zero byte scores at least eight bits better than none.
        let mut one_zero_byte = [0xff; HASH_LEN];
        one_zero_byte[0] = 0;
        let some = BlockId(Hash256(one_zero_byte));
        assert!(some.difficulty_score() > all_ones.difficulty_score() + 7.9);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(Block::decode(b"not a block").is_none());
    }
}
