//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed node metrics, and an async HTTP
//! exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};

/// Node-level Prometheus metrics.
///
/// These are registered into a [`Registry`] and updated from the executor,
/// miner, and connection layers.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Blocks validated and applied to the canonical chain.
    pub blocks_applied_total: IntCounter,
    /// Blocks this node mined itself.
    pub blocks_mined_total: IntCounter,
    /// Blocks rejected by validation.
    pub invalid_blocks_total: IntCounter,
    /// Gossiped transactions accepted into the mempool.
    pub transactions_pooled_total: IntCounter,
    /// Currently-connected peers.
    pub connected_peers: IntGauge,
    /// Wall-clock duration of a mining round that produced a block.
    pub mining_round_seconds: Histogram,
}

impl NodeMetrics {
    /// Registers node metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let blocks_applied_total = IntCounter::with_opts(Opts::new(
            "node_blocks_applied_total",
            "Blocks validated and applied to the canonical chain",
        ))?;
        registry.register(Box::new(blocks_applied_total.clone()))?;

        let blocks_mined_total = IntCounter::with_opts(Opts::new(
            "node_blocks_mined_total",
            "Blocks mined locally",
        ))?;
        registry.register(Box::new(blocks_mined_total.clone()))?;

        let invalid_blocks_total = IntCounter::with_opts(Opts::new(
            "node_invalid_blocks_total",
            "Blocks rejected by validation",
        ))?;
        registry.register(Box::new(invalid_blocks_total.clone()))?;

        let transactions_pooled_total = IntCounter::with_opts(Opts::new(
            "node_transactions_pooled_total",
            "Gossiped transactions accepted into the mempool",
        ))?;
        registry.register(Box::new(transactions_pooled_total.clone()))?;

        let connected_peers = IntGauge::with_opts(Opts::new(
            "node_connected_peers",
            "Currently-connected peers",
        ))?;
        registry.register(Box::new(connected_peers.clone()))?;

        let mining_round_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "node_mining_round_seconds",
                "Wall-clock duration of mining rounds that produced a block",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]),
        )?;
        registry.register(Box::new(mining_round_seconds.clone()))?;

        Ok(Self {
            blocks_applied_total,
            blocks_mined_total,
            invalid_blocks_total,
            transactions_pooled_total,
            connected_peers,
            mining_round_seconds,
        })
    }
}

/// Owns the Prometheus registry and the typed node metrics.
pub struct MetricsRegistry {
    registry: Registry,
    pub node: NodeMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the node metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("chain".to_string()), None)?;
        let node = NodeMetrics::register(&registry)?;
        Ok(Self { registry, node })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!(error = %e, "failed to encode Prometheus metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
///
/// This function is `async` and is intended to be spawned onto a Tokio
/// runtime.
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                tracing::warn!(error = %err, "prometheus HTTP server error");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = metrics.gather_text();
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
                .body(Full::new(Bytes::from(body)))
                .unwrap())
        }
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("not found")))
            .unwrap()),
    }
}
