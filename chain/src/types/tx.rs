// chain/src/types/tx.rs

//! Transaction types for the UTXO ledger.
//!
//! A transaction consumes previously-created outputs (via [`InEntry`]
//! references) and creates new ones ([`OutEntry`]). A transaction with zero
//! inputs is a coinbase: it mints the block reward and is only valid as the
//! first transaction of a block.
//!
//! Serialization is done with **bincode 2** using the `serde` integration
//! (`bincode::serde::encode_to_vec`) and an explicit `standard()` config.
//! The same canonical encoding is used everywhere we need transaction bytes,
//! including id computation.

use serde::{Deserialize, Serialize};

use super::{Address, Hash256};

/// Strongly-typed transaction id.
///
/// This is the content hash of a [`Transaction`], computed as a BLAKE3-256
/// digest over the canonical bincode-2 serialization.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TxId(pub Hash256);

/// Key identifying a single unspent output.
///
/// An output is uniquely identified by the id of the transaction that
/// created it and its position in that transaction's output list.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct UtxoKey {
    /// Id of the transaction that created the output.
    pub tx_id: TxId,
    /// Index of the output within that transaction.
    pub index: u32,
}

/// Reference to an output being spent.
///
/// Each `InEntry` references exactly one prior output. Whether the
/// referenced output is still unspent is enforced at apply time by the
/// executor, not at construction time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InEntry {
    /// Id of the transaction whose output is being spent.
    pub tx_id: TxId,
    /// Index of the output within the referenced transaction.
    pub out_index: u32,
    /// Opaque ownership proof bytes.
    ///
    /// The encoding is scheme-specific; the chain only carries these bytes
    /// through to the configured [`crate::ownership::OwnershipVerifier`].
    pub proof: Vec<u8>,
}

impl InEntry {
    /// Returns the [`UtxoKey`] this entry points at.
    pub fn utxo_key(&self) -> UtxoKey {
        UtxoKey {
            tx_id: self.tx_id,
            index: self.out_index,
        }
    }
}

/// A newly-created output: a recipient and an amount.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutEntry {
    /// Address the amount is paid to.
    pub recipient: Address,
    /// Amount carried by this output.
    pub amount: u64,
}

/// A transfer of value on the ledger.
///
/// Inputs and outputs are ordered; the order is part of the canonical
/// encoding and therefore of the id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    /// Wall-clock timestamp of the transaction, in milliseconds since epoch.
    pub timestamp: u64,
    /// Ordered references to the outputs being spent. Empty for a coinbase.
    pub inputs: Vec<InEntry>,
    /// Ordered outputs created by this transaction.
    pub outputs: Vec<OutEntry>,
}

impl Transaction {
    /// Returns the canonical byte representation of this transaction.
    ///
    /// This uses **bincode 2** with the `standard()` configuration and
    /// the `serde` integration. All hashing and network encoding that
    /// depend on a "canonical" form should go through this method to
    /// avoid format drift.
    ///
    /// # Panics
    ///
    /// Panics if encoding fails. This is considered a programming
    /// error, because all fields are required to be serializable.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        // Explicit config to avoid relying on any implicit defaults.
        let cfg = bincode::config::standard();
        bincode::serde::encode_to_vec(self, cfg)
            .expect("Transaction should always be serializable with bincode 2 + serde")
    }

    /// Computes the canonical id of this transaction.
    pub fn compute_id(&self) -> TxId {
        TxId(Hash256::compute(&self.canonical_bytes()))
    }

    /// Decodes a transaction from its canonical bytes.
    ///
    /// Returns `None` on malformed input; gossip payloads are untrusted.
    pub fn decode(bytes: &[u8]) -> Option<Transaction> {
        let cfg = bincode::config::standard();
        let (tx, read): (Transaction, usize) =
            bincode::serde::decode_from_slice(bytes, cfg).ok()?;
        if read != bytes.len() {
            return None;
        }
        Some(tx)
    }

    /// A transaction with zero inputs is a coinbase.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Sum of all output amounts.
    ///
    /// Widened to `u128` so that adversarial output lists cannot wrap.
    pub fn output_sum(&self) -> u128 {
        self.outputs.iter().map(|o| o.amount as u128).sum()
    }
}

/// Execution result for a single transaction.
///
/// Populated only after a transaction has been run against UTXO state;
/// it is never serialized or gossiped.
#[derive(Clone, Debug)]
pub struct TxExecInfo {
    /// Fee collected: input sum minus output sum (zero for a coinbase).
    pub fee: u64,
    /// Keys of the outputs this transaction spent.
    pub redeemed: Vec<UtxoKey>,
    /// Outputs this transaction created, with their keys.
    pub generated: Vec<(UtxoKey, OutEntry)>,
}
