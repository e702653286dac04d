//! UTXO ledger state and the transaction state-transition rule.
//!
//! [`UtxoState`] is the set of currently-unspent outputs. It is `Clone` so
//! that tentative execution (block assembly, gossip pre-validation) runs on
//! a snapshot while the committed state keeps a single writer; cloning the
//! map is also how block application rolls back on failure.

use std::collections::{HashMap, HashSet};

use crate::ownership::OwnershipVerifier;
use crate::types::{OutEntry, Transaction, TxExecInfo, TxId, UtxoKey};

use super::error::ExecError;

/// The set of currently-unspent transaction outputs.
#[derive(Clone, Debug, Default)]
pub struct UtxoState {
    unspent: HashMap<UtxoKey, OutEntry>,
}

impl UtxoState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unspent outputs.
    pub fn len(&self) -> usize {
        self.unspent.len()
    }

    /// Returns `true` if no outputs are unspent.
    pub fn is_empty(&self) -> bool {
        self.unspent.is_empty()
    }

    /// Looks up an unspent output.
    pub fn get(&self, key: &UtxoKey) -> Option<&OutEntry> {
        self.unspent.get(key)
    }

    /// Returns `true` if the output exists and is unspent.
    pub fn contains(&self, key: &UtxoKey) -> bool {
        self.unspent.contains_key(key)
    }

    /// Executes a single transaction against this state.
    ///
    /// For a non-coinbase transaction, every input is resolved against the
    /// unspent set ([`ExecError::UnknownOutput`] if a referenced output is
    /// missing or already spent, including a second reference within the
    /// same transaction), its ownership proof is checked through `ownership`,
    /// and the output sum must not exceed the resolved input sum
    /// ([`ExecError::InsufficientFunds`]).
    ///
    /// For a coinbase transaction (zero inputs), `coinbase_amount` is taken
    /// as the available funds and the output sum must equal it exactly.
    ///
    /// On success the referenced outputs are marked spent, the created
    /// outputs become unspent, any `collector` receives the created outputs,
    /// and the returned [`TxExecInfo`] records the collected fee. The state
    /// is not modified on failure; callers running multi-transaction batches
    /// still roll back the batch as a whole by discarding their snapshot.
    pub fn run_transaction<O: OwnershipVerifier>(
        &mut self,
        ownership: &O,
        tx: &Transaction,
        tx_id: TxId,
        block_time: u64,
        coinbase_amount: u64,
        collector: Option<&mut Vec<(UtxoKey, OutEntry)>>,
    ) -> Result<TxExecInfo, ExecError> {
        tracing::trace!(
            tx = %tx_id.0.short_hex(),
            block_time,
            inputs = tx.inputs.len(),
            outputs = tx.outputs.len(),
            "running transaction"
        );

        let out_sum = tx.output_sum();

        let (fee, redeemed) = if tx.is_coinbase() {
            if out_sum != coinbase_amount as u128 {
                return Err(ExecError::CoinbaseMismatch {
                    expected: coinbase_amount,
                    actual: out_sum.min(u64::MAX as u128) as u64,
                });
            }
            (0, Vec::new())
        } else {
            // Resolve every input before mutating anything, so a failed
            // transaction leaves the state untouched. A local seen-set
            // catches the same output referenced twice within one tx.
            let mut seen: HashSet<UtxoKey> = HashSet::new();
            let mut in_sum: u128 = 0;
            let mut redeemed = Vec::with_capacity(tx.inputs.len());

            for entry in &tx.inputs {
                let key = entry.utxo_key();
                if !seen.insert(key) {
                    return Err(ExecError::UnknownOutput(key));
                }
                let spent = self
                    .unspent
                    .get(&key)
                    .ok_or(ExecError::UnknownOutput(key))?;
                if !ownership.verify_spend(tx, entry, spent) {
                    return Err(ExecError::OwnershipRejected(key));
                }
                in_sum += spent.amount as u128;
                redeemed.push(key);
            }

            if out_sum > in_sum {
                return Err(ExecError::InsufficientFunds {
                    available: in_sum.min(u64::MAX as u128) as u64,
                    requested: out_sum.min(u64::MAX as u128) as u64,
                });
            }

            let fee = (in_sum - out_sum).min(u64::MAX as u128) as u64;
            (fee, redeemed)
        };

        for key in &redeemed {
            self.unspent.remove(key);
        }

        let mut generated = Vec::with_capacity(tx.outputs.len());
        for (index, out) in tx.outputs.iter().enumerate() {
            let key = UtxoKey {
                tx_id,
                index: index as u32,
            };
            self.unspent.insert(key, out.clone());
            generated.push((key, out.clone()));
        }

        if let Some(collector) = collector {
            collector.extend(generated.iter().cloned());
        }

        Ok(TxExecInfo {
            fee,
            redeemed,
            generated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ownership::{AcceptAllOwnership, RejectAllOwnership};
    use crate::types::{Address, Hash256, InEntry, HASH_LEN};

    fn dummy_address(byte: u8) -> Address {
        Address(Hash256([byte; HASH_LEN]))
    }

    fn coinbase(amount: u64) -> Transaction {
        Transaction {
            timestamp: 1,
            inputs: Vec::new(),
            outputs: vec![OutEntry {
                recipient: dummy_address(1),
                amount,
            }],
        }
    }

    fn spend(source: TxId, out_index: u32, amounts: &[u64]) -> Transaction {
        Transaction {
            timestamp: 2,
            inputs: vec![InEntry {
                tx_id: source,
                out_index,
                proof: Vec::new(),
            }],
            outputs: amounts
                .iter()
                .map(|&amount| OutEntry {
                    recipient: dummy_address(9),
                    amount,
                })
                .collect(),
        }
    }

    /// Seeds a state with a single 100-unit coinbase output and returns its
    /// transaction id.
    fn seeded_state() -> (UtxoState, TxId) {
        let mut state = UtxoState::new();
        let cb = coinbase(100);
        let cb_id = cb.compute_id();
        state
            .run_transaction(&AcceptAllOwnership, &cb, cb_id, 1, 100, None)
            .expect("seeding coinbase should apply");
        (state, cb_id)
    }

    #[test]
    fn coinbase_requires_exact_output_sum() {
        let mut state = UtxoState::new();
        let cb = coinbase(100);
        let cb_id = cb.compute_id();

        let err = state
            .run_transaction(&AcceptAllOwnership, &cb, cb_id, 1, 99, None)
            .unwrap_err();
        match err {
            ExecError::CoinbaseMismatch { expected, actual } => {
                assert_eq!(expected, 99);
                assert_eq!(actual, 100);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(state.is_empty());

        state
            .run_transaction(&AcceptAllOwnership, &cb, cb_id, 1, 100, None)
            .expect("matching amount should apply");
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn spend_collects_fee_and_rotates_outputs() {
        let (mut state, cb_id) = seeded_state();

        let tx = spend(cb_id, 0, &[60, 30]);
        let tx_id = tx.compute_id();
        let mut collected = Vec::new();
        let info = state
            .run_transaction(&AcceptAllOwnership, &tx, tx_id, 2, 0, Some(&mut collected))
            .expect("valid spend should apply");

        assert_eq!(info.fee, 10);
        assert_eq!(info.redeemed, vec![UtxoKey { tx_id: cb_id, index: 0 }]);
        assert_eq!(info.generated.len(), 2);
        assert_eq!(collected.len(), 2);

        // The source output is spent, the two new ones are live.
        assert!(!state.contains(&UtxoKey { tx_id: cb_id, index: 0 }));
        assert!(state.contains(&UtxoKey { tx_id, index: 0 }));
        assert!(state.contains(&UtxoKey { tx_id, index: 1 }));
    }

    #[test]
    fn unknown_output_is_rejected() {
        let (mut state, _) = seeded_state();
        let bogus = TxId(Hash256([0xaa; HASH_LEN]));
        let tx = spend(bogus, 3, &[1]);
        let id = tx.compute_id();

        let err = state
            .run_transaction(&AcceptAllOwnership, &tx, id, 2, 0, None)
            .unwrap_err();
        assert!(matches!(err, ExecError::UnknownOutput(_)));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn second_spend_of_same_output_is_rejected() {
        let (mut state, cb_id) = seeded_state();

        let first = spend(cb_id, 0, &[100]);
        let first_id = first.compute_id();
        state
            .run_transaction(&AcceptAllOwnership, &first, first_id, 2, 0, None)
            .expect("first spend should apply");

        let second = spend(cb_id, 0, &[50]);
        let second_id = second.compute_id();
        let err = state
            .run_transaction(&AcceptAllOwnership, &second, second_id, 3, 0, None)
            .unwrap_err();
        assert!(matches!(err, ExecError::UnknownOutput(_)));
    }

    #[test]
    fn duplicate_input_within_one_tx_is_rejected() {
        let (mut state, cb_id) = seeded_state();

        let mut tx = spend(cb_id, 0, &[150]);
        tx.inputs.push(InEntry {
            tx_id: cb_id,
            out_index: 0,
            proof: Vec::new(),
        });
        let id = tx.compute_id();

        let err = state
            .run_transaction(&AcceptAllOwnership, &tx, id, 2, 0, None)
            .unwrap_err();
        assert!(matches!(err, ExecError::UnknownOutput(_)));
        // Failed transaction left the source output unspent.
        assert!(state.contains(&UtxoKey { tx_id: cb_id, index: 0 }));
    }

    #[test]
    fn overspending_is_rejected() {
        let (mut state, cb_id) = seeded_state();
        let tx = spend(cb_id, 0, &[101]);
        let id = tx.compute_id();

        let err = state
            .run_transaction(&AcceptAllOwnership, &tx, id, 2, 0, None)
            .unwrap_err();
        match err {
            ExecError::InsufficientFunds {
                available,
                requested,
            } => {
                assert_eq!(available, 100);
                assert_eq!(requested, 101);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejected_ownership_proof_blocks_the_spend() {
        let (mut state, cb_id) = seeded_state();
        let tx = spend(cb_id, 0, &[100]);
        let id = tx.compute_id();

        let err = state
            .run_transaction(&RejectAllOwnership, &tx, id, 2, 0, None)
            .unwrap_err();
        assert!(matches!(err, ExecError::OwnershipRejected(_)));
        assert!(state.contains(&UtxoKey { tx_id: cb_id, index: 0 }));
    }
}
