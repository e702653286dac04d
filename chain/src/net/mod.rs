//! Peer networking: framing, wire messages, the connection layer, and the
//! message router.
//!
//! The split mirrors the two halves of the gossip protocol: `connection`
//! owns sockets and moves framed bytes, `router` interprets decoded
//! envelopes and drives the executor, mempool, and miner. The two meet at
//! the router's single-consumer input queue.

pub mod connection;
pub mod error;
pub mod framing;
pub mod router;
pub mod wire;

pub use connection::{ConnectionManager, RouterInput, RouterSender};
pub use error::NetError;
pub use router::MessageRouter;
pub use wire::{Envelope, Hello, InventoryKind, InventoryMessage};
