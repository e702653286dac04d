//! The fixed genesis block.
//!
//! Every node on a network derives the same genesis block from its
//! [`ConsensusConfig`]: same timestamp, same coinbase recipient, same
//! difficulty, therefore the same id. The genesis id anchors ancestry
//! walks and is exchanged during the peer handshake.
//!
//! Genesis is exempt from the proof-of-work check; it is applied directly
//! at executor construction, never through gossip.

use crate::consensus::ConsensusConfig;
use crate::types::{Address, Block, BlockHeader, BlockId, Hash256, OutEntry, Transaction, HASH_LEN};

/// Fixed timestamp of the genesis block, in milliseconds since epoch.
pub const GENESIS_TIMESTAMP: u64 = 1_754_000_000_000;

/// Seed for the genesis coinbase recipient address.
const GENESIS_RECIPIENT_SEED: &[u8] = b"chain-genesis-recipient-v1";

/// Builds the genesis block for the given consensus parameters.
///
/// The block contains a single coinbase paying the height-zero subsidy to a
/// fixed recipient. Its parent id is the all-zero hash, which is never a
/// valid block id.
pub fn genesis_block(cfg: &ConsensusConfig) -> Block {
    let coinbase = Transaction {
        timestamp: GENESIS_TIMESTAMP,
        inputs: Vec::new(),
        outputs: vec![OutEntry {
            recipient: Address::from_public_key(GENESIS_RECIPIENT_SEED),
            amount: cfg.subsidy(0),
        }],
    };

    let raw = coinbase.canonical_bytes();
    let ids = vec![coinbase.compute_id()];

    let header = BlockHeader {
        previous_hash: BlockId(Hash256([0u8; HASH_LEN])),
        difficulty: cfg.initial_difficulty,
        nonce: 0,
        timestamp: GENESIS_TIMESTAMP,
        tx_root: Block::compute_tx_root(&ids),
    };

    Block {
        header,
        transaction_ids: ids,
        transactions: vec![raw],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_is_deterministic() {
        let cfg = ConsensusConfig::default();
        let a = genesis_block(&cfg);
        let b = genesis_block(&cfg);
        assert_eq!(a.compute_id(), b.compute_id());
    }

    #[test]
    fn genesis_coinbase_pays_height_zero_subsidy() {
        let cfg = ConsensusConfig::default();
        let genesis = genesis_block(&cfg);

        let coinbase = Transaction::decode(&genesis.transactions[0])
            .expect("genesis coinbase should decode");
        assert!(coinbase.is_coinbase());
        assert_eq!(coinbase.output_sum(), cfg.subsidy(0) as u128);
        assert_eq!(coinbase.compute_id(), genesis.transaction_ids[0]);
    }

    #[test]
    fn genesis_root_matches_its_transaction_ids() {
        let cfg = ConsensusConfig::default();
        let genesis = genesis_block(&cfg);
        assert_eq!(
            genesis.header.tx_root,
            Block::compute_tx_root(&genesis.transaction_ids)
        );
    }

    #[test]
    fn different_parameters_give_a_different_genesis() {
        let a = genesis_block(&ConsensusConfig::default());
        let b = genesis_block(&ConsensusConfig {
            initial_subsidy: 7,
            ..ConsensusConfig::default()
        });
        assert_ne!(a.compute_id(), b.compute_id());
    }
}
