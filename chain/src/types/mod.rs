//! Core domain types used by the chain
//!
//! This module defines strongly-typed hashes, addresses, transactions, and
//! blocks that are shared across the chain implementation. The goal is to
//! avoid "naked" byte buffers in public APIs and instead use domain-specific
//! newtypes.
//!
//! All identifiers in this system are content digests: recomputing the digest
//! of an object's canonical bytes is the only valid way to assign or verify
//! its id. Ids are never assigned randomly or signed separately.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub mod block;
pub mod tx;

pub use block::{Block, BlockHeader, BlockId};
pub use tx::{InEntry, OutEntry, Transaction, TxExecInfo, TxId, UtxoKey};

/// Length in bytes of all 256-bit hash types used in this module.
pub const HASH_LEN: usize = 32;

/// Strongly-typed 256-bit hash wrapper (BLAKE3-256).
///
/// This type is used as the backing representation for all fixed-size hashes
/// in the chain (block identifiers, transaction identifiers, addresses,
/// transaction root hashes). It is always exactly [`HASH_LEN`] bytes long.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    /// Computes a new [`Hash256`] as the BLAKE3-256 hash of `data`.
    ///
    /// The result is deterministic for a given byte slice and is suitable
    /// for use as an identifier or content hash, but it is **not**
    /// a password hash or KDF.
    pub fn compute(data: &[u8]) -> Self {
        let h = blake3::hash(data);
        Hash256(*h.as_bytes())
    }

    /// Returns the underlying 32-byte hash as a borrowed array.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Returns the first seven hex characters of the hash.
    ///
    /// Used for compact log rendering; never for identity comparison.
    pub fn short_hex(&self) -> String {
        let mut s = hex::encode(self.0);
        s.truncate(7);
        s
    }
}

/// Recipient address for transaction outputs (hash of a public key).
///
/// An `Address` is derived from an ownership public key using
/// [`Hash256::compute`]. The concrete key scheme is external to the chain;
/// see [`crate::ownership`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Address(pub Hash256);

impl Address {
    /// Derives an [`Address`] from a public key.
    ///
    /// The caller is responsible for passing the canonical byte encoding
    /// of the public key. Different encodings of the same key will result
    /// in different addresses.
    pub fn from_public_key(pk_bytes: &[u8]) -> Self {
        Address(Hash256::compute(pk_bytes))
    }

    /// Returns the underlying [`Hash256`] backing this address.
    pub fn as_hash(&self) -> &Hash256 {
        &self.0
    }
}

/// Returns the current wall-clock time as milliseconds since Unix epoch.
///
/// Block and transaction timestamps use millisecond precision. On error
/// (system clock before epoch) this falls back to 0.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_millis() as u64
}
