//! Candidate block assembly.
//!
//! Assembly works on snapshots only: a copy of the mempool's insertion
//! order and a clone of the committed UTXO state as of the tip. Candidate
//! transactions are sized first (encoded length plus a fixed overhead,
//! stopping at the block size limit), then tentatively executed; a failing
//! transaction is dropped from the candidate set and assembly continues.
//! Such failures are routine during normal gossip, never escalated.

use crate::consensus::ConsensusError;
use crate::mempool::PoolEntry;
use crate::types::{Address, Block, BlockHeader, OutEntry, Transaction, TxId, UtxoKey};
use crate::DefaultChainExecutor;

/// An assembled candidate, ready for the nonce search.
///
/// The header's nonce and timestamp are placeholders; [`super::pow::search`]
/// fills them in.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub header: BlockHeader,
    pub transaction_ids: Vec<TxId>,
    pub transactions: Vec<Vec<u8>>,
    /// Coinbase amount: subsidy at the candidate height plus collected fees.
    pub reward: u64,
    /// Mempool transactions dropped during tentative execution.
    pub dropped: usize,
}

/// Builds a candidate block on top of the executor's current tip.
///
/// `pool` is an insertion-ordered snapshot of the mempool. The coinbase is
/// prepended as the first transaction and pays `recipient`.
pub fn build_candidate(
    executor: &DefaultChainExecutor,
    pool: Vec<(TxId, PoolEntry)>,
    recipient: Address,
    block_time: u64,
) -> Result<Candidate, ConsensusError> {
    let cfg = executor.config();
    let tip_id = executor.tip_id();
    let next_height = executor.latest_block().height + 1;
    let difficulty = executor.next_difficulty_for(&tip_id)?;

    // Size-bounded selection in pool order. The running total starts at an
    // estimated base block size; the first transaction that would push it
    // past the limit ends the selection.
    let mut size = cfg.base_block_size;
    let mut selected = Vec::new();
    for (id, entry) in pool {
        size += entry.raw.len() + cfg.tx_size_overhead;
        if size > cfg.max_block_size_bytes {
            break;
        }
        selected.push((id, entry));
    }

    // Tentative execution against a snapshot of the tip state. New outputs
    // land in the scratch state, so later candidates can spend earlier
    // candidates' outputs.
    let mut scratch = executor.utxo_snapshot();
    let mut created: Vec<(UtxoKey, OutEntry)> = Vec::new();
    let mut fees: u64 = 0;
    let mut included: Vec<(TxId, Vec<u8>)> = Vec::new();
    let mut dropped = 0usize;

    for (id, entry) in selected {
        match scratch.run_transaction(
            executor.ownership(),
            &entry.tx,
            id,
            block_time,
            0,
            Some(&mut created),
        ) {
            Ok(info) => {
                fees = fees.saturating_add(info.fee);
                included.push((id, entry.raw));
            }
            Err(e) => {
                dropped += 1;
                tracing::debug!(
                    tx = %id.0.short_hex(),
                    error = %e,
                    "dropping transaction from candidate"
                );
            }
        }
    }

    let reward = cfg.subsidy(next_height).saturating_add(fees);
    let coinbase = Transaction {
        timestamp: block_time,
        inputs: Vec::new(),
        outputs: vec![OutEntry {
            recipient,
            amount: reward,
        }],
    };
    let coinbase_id = coinbase.compute_id();
    let coinbase_raw = coinbase.canonical_bytes();
    scratch
        .run_transaction(
            executor.ownership(),
            &coinbase,
            coinbase_id,
            block_time,
            reward,
            None,
        )
        .map_err(|e| ConsensusError::InvalidBlock(e.to_string()))?;

    let mut transaction_ids = Vec::with_capacity(included.len() + 1);
    let mut transactions = Vec::with_capacity(included.len() + 1);
    transaction_ids.push(coinbase_id);
    transactions.push(coinbase_raw);
    for (id, raw) in included {
        transaction_ids.push(id);
        transactions.push(raw);
    }

    tracing::debug!(
        height = next_height,
        txs = transaction_ids.len(),
        outputs = created.len(),
        dropped,
        reward,
        "assembled candidate block"
    );

    let header = BlockHeader {
        previous_hash: tip_id,
        difficulty,
        nonce: 0,
        timestamp: block_time,
        tx_root: Block::compute_tx_root(&transaction_ids),
    };

    Ok(Candidate {
        header,
        transaction_ids,
        transactions,
        reward,
        dropped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::ConsensusConfig;
    use crate::genesis::genesis_block;
    use crate::mempool::Mempool;
    use crate::types::{Hash256, InEntry, HASH_LEN};

    fn test_executor() -> DefaultChainExecutor {
        DefaultChainExecutor::with_defaults(ConsensusConfig {
            initial_difficulty: 1.0,
            initial_subsidy: 1_000,
            base_block_size: 350,
            tx_size_overhead: 50,
            ..ConsensusConfig::default()
        })
        .expect("executor")
    }

    fn dummy_address(byte: u8) -> Address {
        Address(Hash256([byte; HASH_LEN]))
    }

    /// A spend of the genesis coinbase output.
    fn genesis_spend(executor: &DefaultChainExecutor, amounts: &[u64]) -> Transaction {
        let genesis = genesis_block(executor.config());
        Transaction {
            timestamp: 7,
            inputs: vec![InEntry {
                tx_id: genesis.transaction_ids[0],
                out_index: 0,
                proof: Vec::new(),
            }],
            outputs: amounts
                .iter()
                .map(|&amount| OutEntry {
                    recipient: dummy_address(0x40),
                    amount,
                })
                .collect(),
        }
    }

    /// A standalone transfer with a payload padded out to `pad` bytes.
    fn padded_tx(pad: usize) -> Transaction {
        Transaction {
            timestamp: 11,
            inputs: vec![InEntry {
                tx_id: TxId(Hash256([9; HASH_LEN])),
                out_index: 0,
                proof: vec![0xab; pad],
            }],
            outputs: Vec::new(),
        }
    }

    fn pool_with(txs: Vec<Transaction>) -> Vec<(TxId, crate::mempool::PoolEntry)> {
        let mut pool = Mempool::new();
        for tx in txs {
            let raw = tx.canonical_bytes();
            pool.add(tx.compute_id(), tx, raw);
        }
        pool.snapshot()
    }

    #[test]
    fn coinbase_leads_and_carries_subsidy_plus_fees() {
        let executor = test_executor();
        // Spend 1000, pay out 900: fee 100.
        let pool = pool_with(vec![genesis_spend(&executor, &[900])]);

        let candidate =
            build_candidate(&executor, pool, dummy_address(1), 1_000).expect("assembly");

        assert_eq!(candidate.transaction_ids.len(), 2);
        assert_eq!(candidate.reward, 1_000 + 100);

        let coinbase =
            Transaction::decode(&candidate.transactions[0]).expect("coinbase decodes");
        assert!(coinbase.is_coinbase());
        assert_eq!(coinbase.output_sum(), candidate.reward as u128);
        assert_eq!(coinbase.compute_id(), candidate.transaction_ids[0]);
    }

    #[test]
    fn header_commits_to_the_assembled_transaction_order() {
        let executor = test_executor();
        let pool = pool_with(vec![genesis_spend(&executor, &[500, 400])]);

        let candidate =
            build_candidate(&executor, pool, dummy_address(1), 1_000).expect("assembly");

        assert_eq!(candidate.header.previous_hash, executor.tip_id());
        assert_eq!(
            candidate.header.tx_root,
            Block::compute_tx_root(&candidate.transaction_ids)
        );
    }

    #[test]
    fn oversized_transaction_is_left_out_of_the_block() {
        let mut cfg = ConsensusConfig {
            initial_difficulty: 1.0,
            initial_subsidy: 1_000,
            base_block_size: 350,
            tx_size_overhead: 50,
            ..ConsensusConfig::default()
        };
        // Two small spends fit; a padded one blows the limit.
        cfg.max_block_size_bytes = 900;
        let executor = DefaultChainExecutor::with_defaults(cfg).expect("executor");

        let small_a = genesis_spend(&executor, &[600]);
        let small_b = Transaction {
            timestamp: 8,
            inputs: vec![InEntry {
                tx_id: small_a.compute_id(),
                out_index: 0,
                proof: Vec::new(),
            }],
            outputs: vec![OutEntry {
                recipient: dummy_address(0x41),
                amount: 600,
            }],
        };
        let oversized = padded_tx(4_000);
        let oversized_id = oversized.compute_id();

        let pool = pool_with(vec![small_a, small_b, oversized]);
        let candidate =
            build_candidate(&executor, pool, dummy_address(1), 1_000).expect("assembly");

        // Exactly the two small transactions plus the coinbase.
        assert_eq!(candidate.transaction_ids.len(), 3);
        assert!(!candidate.transaction_ids.contains(&oversized_id));
        // Assembly never touches the pool, so "remains in mempool" is the
        // caller's default; nothing was dropped for validity either.
        assert_eq!(candidate.dropped, 0);
    }

    #[test]
    fn failing_transaction_is_dropped_and_assembly_continues() {
        let executor = test_executor();

        // Spends a nonexistent output: tentative execution fails.
        let bogus = Transaction {
            timestamp: 9,
            inputs: vec![InEntry {
                tx_id: TxId(Hash256([0xcc; HASH_LEN])),
                out_index: 5,
                proof: Vec::new(),
            }],
            outputs: Vec::new(),
        };
        let valid = genesis_spend(&executor, &[1_000]);
        let valid_id = valid.compute_id();

        let pool = pool_with(vec![bogus, valid]);
        let candidate =
            build_candidate(&executor, pool, dummy_address(1), 1_000).expect("assembly");

        assert_eq!(candidate.dropped, 1);
        assert_eq!(candidate.transaction_ids.len(), 2);
        assert_eq!(candidate.transaction_ids[1], valid_id);
    }

    #[test]
    fn later_candidates_can_spend_earlier_candidate_outputs() {
        let executor = test_executor();
        let first = genesis_spend(&executor, &[700]);
        let second = Transaction {
            timestamp: 10,
            inputs: vec![InEntry {
                tx_id: first.compute_id(),
                out_index: 0,
                proof: Vec::new(),
            }],
            outputs: vec![OutEntry {
                recipient: dummy_address(0x42),
                amount: 650,
            }],
        };

        let pool = pool_with(vec![first, second]);
        let candidate =
            build_candidate(&executor, pool, dummy_address(1), 1_000).expect("assembly");

        assert_eq!(candidate.dropped, 0);
        assert_eq!(candidate.transaction_ids.len(), 3);
        // Fees: (1000 - 700) + (700 - 650).
        assert_eq!(candidate.reward, 1_000 + 300 + 50);
    }

    #[test]
    fn empty_pool_yields_a_coinbase_only_block() {
        let executor = test_executor();
        let candidate =
            build_candidate(&executor, Vec::new(), dummy_address(1), 1_000).expect("assembly");

        assert_eq!(candidate.transaction_ids.len(), 1);
        assert_eq!(candidate.reward, 1_000);
    }
}
