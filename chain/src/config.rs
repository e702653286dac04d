//! Top-level configuration for a node.
//!
//! This module aggregates configuration for:
//!
//! - consensus parameters (`ConsensusConfig`),
//! - the peer protocol listener and bootstrap peers (`NetworkConfig`),
//! - the local miner (`MinerConfig`),
//! - the metrics exporter (enable flag + listen address).
//!
//! The goal is to have a single `NodeConfig` struct that higher-level
//! binaries (e.g. `main.rs`) can construct from defaults, config files,
//! or environment variables as needed.

use std::net::SocketAddr;

use crate::consensus::ConsensusConfig;
use crate::types::Address;

/// Configuration for the peer protocol socket layer.
#[derive(Clone, Debug)]
pub struct NetworkConfig {
    /// Address to bind the peer listener to.
    pub listen_addr: SocketAddr,
    /// Peers to dial at startup.
    pub bootstrap_peers: Vec<SocketAddr>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        // Safe to unwrap: this is a fixed, valid address literal.
        let addr: SocketAddr = "0.0.0.0:7911"
            .parse()
            .expect("hard-coded peer listen address should parse");
        Self {
            listen_addr: addr,
            bootstrap_peers: Vec::new(),
        }
    }
}

/// Configuration for the local miner.
#[derive(Clone, Debug)]
pub struct MinerConfig {
    /// Whether this node mines at all.
    pub enabled: bool,
    /// Address block rewards are paid to.
    pub recipient: Address,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // In a real deployment this comes from a wallet key; the
            // default derives a stable placeholder address.
            recipient: Address::from_public_key(b"local-miner-recipient"),
        }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        // Safe to unwrap: this is a fixed, valid address literal.
        let addr: SocketAddr = "127.0.0.1:9898"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self {
            enabled: true,
            listen_addr: addr,
        }
    }
}

/// Top-level configuration for a node.
///
/// This aggregates all the sub-configs needed to wire up a typical peer:
///
/// - consensus tuning (`consensus`),
/// - socket layer (`network`),
/// - local mining (`miner`),
/// - Prometheus metrics exporter (`metrics`).
#[derive(Clone, Debug, Default)]
pub struct NodeConfig {
    pub consensus: ConsensusConfig,
    pub network: NetworkConfig,
    pub miner: MinerConfig,
    pub metrics: MetricsConfig,
}
