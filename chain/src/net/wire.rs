//! Wire message types.
//!
//! An [`Envelope`] is the unit of transmission: a tagged payload carried
//! inside one frame. Encoding uses the same canonical bincode-2 setup as
//! the rest of the chain, so the bytes on the wire are deterministic.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::types::{BlockId, Hash256};

/// Handshake message sent to a freshly-accepted peer.
///
/// Carries everything the remote needs to judge whether it is on the same
/// network and whether a sync is warranted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Hello {
    /// Snapshot of the sender's current peer addresses.
    pub peers: Vec<SocketAddr>,
    /// Id of the sender's genesis block; a mismatch means a different
    /// network.
    pub genesis_id: BlockId,
    /// All block ids the sender currently holds.
    pub known_block_ids: Vec<BlockId>,
}

/// Whether an inventory message merely announces an id or carries content.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum InventoryKind {
    /// "I have this id" — the content can be requested separately.
    Announce,
    /// The full encoded object rides along in `payload`.
    Content,
}

/// Gossip for a single block or transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InventoryMessage {
    pub kind: InventoryKind,
    /// Id of the object being announced or carried.
    pub id: Hash256,
    /// `true` for a block payload, `false` for a transaction payload.
    pub is_block: bool,
    /// Canonical bytes of the object; empty for an announce.
    pub payload: Vec<u8>,
}

/// The unit of wire transmission: a message-type tag plus typed payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Envelope {
    Hello(Hello),
    Inventory(InventoryMessage),
}

impl Envelope {
    /// Returns the canonical byte representation of this envelope.
    ///
    /// # Panics
    ///
    /// Panics if encoding fails. This is considered a programming
    /// error, because all fields are required to be serializable.
    pub fn encode(&self) -> Vec<u8> {
        let cfg = bincode::config::standard();
        bincode::serde::encode_to_vec(self, cfg)
            .expect("Envelope should always be serializable with bincode 2 + serde")
    }

    /// Decodes an envelope from one frame's payload.
    ///
    /// Returns `None` on malformed input; gossip is untrusted.
    pub fn decode(bytes: &[u8]) -> Option<Envelope> {
        let cfg = bincode::config::standard();
        let (env, read): (Envelope, usize) =
            bincode::serde::decode_from_slice(bytes, cfg).ok()?;
        if read != bytes.len() {
            return None;
        }
        Some(env)
    }
}
