use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::hub::Hub;

#[derive(Serialize)]
pub struct RoomSummary {
    pub room: String,
    pub peer_count: usize,
}

/// GET /rooms — lists currently active rooms and their peer counts.
pub async fn list_rooms(State(hub): State<Arc<Hub>>) -> Json<Vec<RoomSummary>> {
    let rooms = hub
        .room_names()
        .await
        .into_iter()
        .map(|(room, peer_count)| RoomSummary { room, peer_count })
        .collect();
    Json(rooms)
}
