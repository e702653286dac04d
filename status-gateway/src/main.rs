// status-gateway/src/main.rs

//! Status gateway binary.
//!
//! A deliberately tiny HTTP endpoint on its own port, external to the node
//! core:
//!
//! - `GET /` — embedded static status page
//! - `GET /health` — liveness probe
//!
//! It holds no chain state and talks to no other process; it exists so
//! operators and load balancers have something cheap to poke.

mod config;
mod routes;

use axum::{Router, routing::get};

use config::StatusConfig;
use routes::{health, page};

#[tokio::main]
async fn main() {
    // Basic tracing setup.
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "status_gateway=info".to_string()),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let cfg = StatusConfig::default();

    let app = Router::new()
        .route("/", get(page::index))
        .route("/health", get(health::health));

    tracing::info!("status gateway listening on http://{}", cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(cfg.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", cfg.listen_addr))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| format!("server error: {e}"))
}
