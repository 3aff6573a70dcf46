use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::hub::Hub;

/// GET /health — liveness probe, returns server metadata and room counts.
pub async fn health_handler(State(hub): State<Arc<Hub>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "rooms": hub.room_count(),
    }))
}
