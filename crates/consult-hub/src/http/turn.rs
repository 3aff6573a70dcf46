use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::hub::Hub;

#[derive(Serialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

/// GET /turn-credentials — ICE server list handed to the browser's
/// `RTCPeerConnection` constructor. The STUN entry is always present; the
/// TURN entry is included only when a server url was configured.
pub async fn turn_credentials(State(hub): State<Arc<Hub>>) -> Json<Vec<IceServer>> {
    let turn = &hub.config.turn;
    let mut servers = vec![IceServer {
        urls: vec![turn.stun_server_url.clone()],
        username: None,
        credential: None,
    }];

    if let Some(server_url) = &turn.server_url {
        servers.push(IceServer {
            urls: vec![server_url.clone()],
            username: turn.username.clone(),
            credential: turn.credential.clone(),
        });
    }

    Json(servers)
}
