//! Metrics and instrumentation for the node.
//!
//! This module defines Prometheus-compatible metrics for the executor,
//! miner, and connection layers, and exposes a small HTTP exporter that
//! serves `/metrics` in Prometheus text format.
//!
//! Typical usage in a node:
//!
//! ```ignore
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//! use chain::metrics::{MetricsRegistry, run_prometheus_http_server};
//!
//! let registry = Arc::new(MetricsRegistry::new()?);
//! let addr: SocketAddr = "127.0.0.1:9898".parse()?;
//!
//! // Spawn the HTTP exporter in the background:
//! tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
//!
//! // Elsewhere in the code:
//! registry.node.blocks_applied_total.inc();
//! ```

pub mod prometheus;

pub use prometheus::{MetricsRegistry, NodeMetrics, run_prometheus_http_server};
