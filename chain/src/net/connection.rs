//! Peer connection layer.
//!
//! The connection manager exclusively owns every peer socket: an accept
//! loop owns the listener, and each established connection gets a reader
//! task (frame reassembly, envelope decode, hand-off to the router) and a
//! writer task fed by a per-peer outbox channel. Everything outside this
//! module addresses peers by `SocketAddr` only.
//!
//! Outbound and inbound peers land in the same table and are
//! indistinguishable once established. The accepting side opens the
//! handshake: it immediately sends a [`Hello`] carrying its peer list,
//! genesis id, and known block ids.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};

use crate::metrics::MetricsRegistry;
use crate::SharedExecutor;

use super::error::NetError;
use super::framing;
use super::wire::{Envelope, Hello};

/// One unit of work for the message router: a decoded envelope plus the
/// peer it came from (`None` for locally-produced messages).
#[derive(Debug)]
pub struct RouterInput {
    pub envelope: Envelope,
    pub origin: Option<SocketAddr>,
}

/// Sending end of the router's single-consumer queue.
pub type RouterSender = mpsc::UnboundedSender<RouterInput>;

struct PeerHandle {
    outbox: mpsc::UnboundedSender<Vec<u8>>,
}

struct Inner {
    peers: Mutex<HashMap<SocketAddr, PeerHandle>>,
    /// Addresses learned from Hello messages, kept for later dials.
    candidates: Mutex<HashSet<SocketAddr>>,
    router: RouterSender,
    executor: SharedExecutor,
    metrics: Arc<MetricsRegistry>,
}

/// Handle to the connection layer. Cheap to clone; all clones share the
/// same peer table.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(
        executor: SharedExecutor,
        router: RouterSender,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                peers: Mutex::new(HashMap::new()),
                candidates: Mutex::new(HashSet::new()),
                router,
                executor,
                metrics,
            }),
        }
    }

    /// Binds the listener and spawns the accept loop.
    ///
    /// Returns the bound address (useful with port 0). A bind failure is
    /// fatal for the node and is surfaced to the caller.
    pub async fn start(&self, listen_addr: SocketAddr) -> Result<SocketAddr, NetError> {
        let listener = TcpListener::bind(listen_addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "peer listener bound");

        let manager = self.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer_addr)) => {
                        tracing::info!(peer = %peer_addr, "accepted connection");
                        manager.register_peer(stream, peer_addr, true).await;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                }
            }
        });

        Ok(local_addr)
    }

    /// Dials a peer in the background.
    ///
    /// On success the connection is registered in the same table as
    /// inbound ones; the remote side opens the handshake.
    pub fn connect(&self, addr: SocketAddr) {
        let manager = self.clone();
        tokio::spawn(async move {
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    tracing::info!(peer = %addr, "connected");
                    manager.register_peer(stream, addr, false).await;
                }
                Err(e) => {
                    tracing::warn!(peer = %addr, error = %e, "connect failed");
                }
            }
        });
    }

    async fn register_peer(&self, stream: TcpStream, addr: SocketAddr, send_hello: bool) {
        let (read_half, write_half) = stream.into_split();
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();

        {
            let mut peers = self.inner.peers.lock().await;
            peers.insert(addr, PeerHandle { outbox: outbox_tx });
            self.inner
                .metrics
                .node
                .connected_peers
                .set(peers.len() as i64);
        }

        let manager = self.clone();
        tokio::spawn(async move { manager.write_loop(write_half, outbox_rx, addr).await });
        let manager = self.clone();
        tokio::spawn(async move { manager.read_loop(read_half, addr).await });

        if send_hello {
            self.send_hello(addr).await;
        }
    }

    /// Handshake-on-connect: greets `addr` with our peer list, genesis id,
    /// and known block ids.
    async fn send_hello(&self, addr: SocketAddr) {
        let peers: Vec<SocketAddr> = self
            .peer_addrs()
            .await
            .into_iter()
            .filter(|a| *a != addr)
            .collect();
        let hello = {
            let executor = self.inner.executor.lock().await;
            Hello {
                peers,
                genesis_id: executor.genesis_id(),
                known_block_ids: executor.known_block_ids(),
            }
        };
        self.send_to(&Envelope::Hello(hello), addr).await;
    }

    async fn write_loop(
        &self,
        mut write_half: OwnedWriteHalf,
        mut outbox: mpsc::UnboundedReceiver<Vec<u8>>,
        addr: SocketAddr,
    ) {
        while let Some(payload) = outbox.recv().await {
            if let Err(e) = framing::write_frame(&mut write_half, &payload).await {
                tracing::warn!(peer = %addr, error = %e, "write failed, dropping peer");
                self.drop_peer(addr).await;
                break;
            }
        }
    }

    async fn read_loop(&self, mut read_half: OwnedReadHalf, addr: SocketAddr) {
        loop {
            match framing::read_frame(&mut read_half).await {
                Ok(payload) => match Envelope::decode(&payload) {
                    Some(envelope) => {
                        let _ = self.inner.router.send(RouterInput {
                            envelope,
                            origin: Some(addr),
                        });
                    }
                    None => {
                        // Malformed message: drop it, keep the peer.
                        let err = NetError::Decode("envelope payload");
                        tracing::debug!(peer = %addr, error = %err, "dropping message");
                    }
                },
                Err(e) => {
                    tracing::info!(peer = %addr, error = %e, "connection closed");
                    self.drop_peer(addr).await;
                    break;
                }
            }
        }
    }

    /// Removes a peer from the table; its reader/writer tasks wind down on
    /// their own once the socket halves error out or the outbox closes.
    pub async fn drop_peer(&self, addr: SocketAddr) {
        let mut peers = self.inner.peers.lock().await;
        if peers.remove(&addr).is_some() {
            self.inner
                .metrics
                .node
                .connected_peers
                .set(peers.len() as i64);
        }
    }

    /// Queues `envelope` to every currently-connected peer.
    ///
    /// The peer set is snapshotted up front: peers joining mid-broadcast
    /// are simply not included. Each peer's bytes go through its own
    /// writer task, so one slow or failing peer never blocks the others.
    pub async fn broadcast(&self, envelope: &Envelope) {
        self.broadcast_except(envelope, None).await;
    }

    /// Like [`broadcast`](Self::broadcast), best-effort skipping `skip`.
    pub async fn broadcast_except(&self, envelope: &Envelope, skip: Option<SocketAddr>) {
        let payload = envelope.encode();
        let snapshot: Vec<(SocketAddr, mpsc::UnboundedSender<Vec<u8>>)> = {
            let peers = self.inner.peers.lock().await;
            peers
                .iter()
                .filter(|(addr, _)| Some(**addr) != skip)
                .map(|(addr, handle)| (*addr, handle.outbox.clone()))
                .collect()
        };
        for (addr, outbox) in snapshot {
            if outbox.send(payload.clone()).is_err() {
                tracing::debug!(peer = %addr, "outbox closed, skipping");
            }
        }
    }

    /// Queues `envelope` to a single peer. Returns `false` if the peer is
    /// not connected.
    pub async fn send_to(&self, envelope: &Envelope, addr: SocketAddr) -> bool {
        let payload = envelope.encode();
        let peers = self.inner.peers.lock().await;
        match peers.get(&addr) {
            Some(handle) => handle.outbox.send(payload).is_ok(),
            None => false,
        }
    }

    /// Merges addresses learned from a Hello into the candidate set.
    pub async fn add_candidates<I>(&self, addrs: I)
    where
        I: IntoIterator<Item = SocketAddr>,
    {
        let mut candidates = self.inner.candidates.lock().await;
        candidates.extend(addrs);
    }

    /// Snapshot of the candidate peer set.
    pub async fn candidate_peers(&self) -> Vec<SocketAddr> {
        self.inner.candidates.lock().await.iter().copied().collect()
    }

    /// Snapshot of the connected peer addresses.
    pub async fn peer_addrs(&self) -> Vec<SocketAddr> {
        self.inner.peers.lock().await.keys().copied().collect()
    }

    /// Number of currently-connected peers.
    pub async fn peer_count(&self) -> usize {
        self.inner.peers.lock().await.len()
    }
}
