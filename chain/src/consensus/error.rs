use std::fmt;

use crate::types::{BlockId, UtxoKey};

/// Error type returned when executing a single transaction against UTXO
/// state.
#[derive(Debug)]
pub enum ExecError {
    /// A referenced output does not exist or has already been spent.
    UnknownOutput(UtxoKey),
    /// The transaction tries to create more value than its inputs resolve to.
    InsufficientFunds { available: u64, requested: u64 },
    /// A coinbase whose output sum does not equal the provided amount.
    CoinbaseMismatch { expected: u64, actual: u64 },
    /// The ownership proof for an input was rejected.
    OwnershipRejected(UtxoKey),
}

/// High-level errors that can occur in the chain executor.
#[derive(Debug)]
pub enum ConsensusError {
    /// Block failed a validity rule; it is dropped, not applied, and not
    /// propagated.
    InvalidBlock(String),
    /// Transaction failed validation on the gossip path; dropped silently.
    InvalidTransaction(String),
    /// The ancestry walk hit a missing link before reaching genesis. The
    /// block is unresolvable pending sync, not invalid.
    BrokenChain(BlockId),
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::UnknownOutput(key) => write!(
                f,
                "unknown or spent output {}:{}",
                key.tx_id.0.short_hex(),
                key.index
            ),
            ExecError::InsufficientFunds {
                available,
                requested,
            } => write!(
                f,
                "insufficient funds: outputs {requested} exceed inputs {available}"
            ),
            ExecError::CoinbaseMismatch { expected, actual } => write!(
                f,
                "coinbase output sum {actual} does not equal reward {expected}"
            ),
            ExecError::OwnershipRejected(key) => write!(
                f,
                "ownership proof rejected for output {}:{}",
                key.tx_id.0.short_hex(),
                key.index
            ),
        }
    }
}

impl fmt::Display for ConsensusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsensusError::InvalidBlock(msg) => write!(f, "invalid block: {msg}"),
            ConsensusError::InvalidTransaction(msg) => write!(f, "invalid transaction: {msg}"),
            ConsensusError::BrokenChain(id) => {
                write!(f, "broken chain at missing block {}", id.0.short_hex())
            }
        }
    }
}

impl std::error::Error for ExecError {}
impl std::error::Error for ConsensusError {}
