use std::sync::Arc;

use axum::{routing::get, Router};

use crate::hub::Hub;

/// Assemble the full Axum router over a shared [`Hub`].
pub fn build_router(hub: Arc<Hub>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/rooms", get(crate::http::rooms::list_rooms))
        .route("/turn-credentials", get(crate::http::turn::turn_credentials))
        .route("/ws", get(crate::ws::connection::ws_handler))
        .with_state(hub)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
