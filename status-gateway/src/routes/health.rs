//! Liveness probe.

use axum::Json;
use serde_json::{Value, json};

/// `GET /health` — always OK while the process is up.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
