use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{ws::Message, ws::WebSocket, State, WebSocketUpgrade},
    response::IntoResponse,
};
use consult_core::types::{PeerId, RoomName, SpeakerRole};
use consult_protocol::frames::{ClientFrame, ServerFrame};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::hub::Hub;

const OUTBOUND_CHANNEL_CAPACITY: usize = 64;

/// Axum handler — upgrades HTTP to WebSocket at GET /ws.
pub async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<Arc<Hub>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_connection(socket, hub))
}

/// Per-connection task. The first frame a peer sends must be `join`; every
/// frame after that is either signaling (routed to one peer) or a
/// transcript line (handed to the room's analysis agent). The connection
/// ends the moment the peer disconnects or sends `leave`.
async fn handle_connection(socket: WebSocket, hub: Arc<Hub>) {
    let (ws_tx, mut ws_rx) = socket.split();
    let (out_tx, out_rx) = mpsc::channel::<ServerFrame>(OUTBOUND_CHANNEL_CAPACITY);

    let writer = tokio::spawn(forward_outbound(ws_tx, out_rx));

    let Some((peer_id, room)) = await_join(&mut ws_rx, &hub, &out_tx).await else {
        writer.abort();
        return;
    };

    info!(peer = %peer_id, room = %room, "peer joined room");

    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                match serde_json::from_str::<ClientFrame>(&text) {
                    Ok(frame) => {
                        if matches!(frame, ClientFrame::Leave) {
                            break;
                        }
                        handle_frame(&hub, &peer_id, &room, frame, &out_tx).await;
                    }
                    Err(e) => {
                        warn!(peer = %peer_id, error = %e, "malformed frame, ignoring");
                        let _ = out_tx
                            .send(ServerFrame::error("bad_request", "malformed frame"))
                            .await;
                    }
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }

    hub.leave(&peer_id).await;
    writer.abort();
    info!(peer = %peer_id, "peer connection closed");
}

/// Blocks until the peer sends a valid `join` frame (or disconnects /
/// sends something else, in which case the connection is rejected).
async fn await_join(
    ws_rx: &mut futures_util::stream::SplitStream<WebSocket>,
    hub: &Arc<Hub>,
    out_tx: &mpsc::Sender<ServerFrame>,
) -> Option<(PeerId, RoomName)> {
    loop {
        let msg = ws_rx.next().await?;
        let Ok(Message::Text(text)) = msg else {
            return None;
        };

        match serde_json::from_str::<ClientFrame>(&text) {
            Ok(ClientFrame::Join { room, nickname }) => {
                let room = RoomName::from(room);
                let (peer_id, peers) = hub.join(room.clone(), nickname, out_tx.clone()).await;
                let _ = out_tx
                    .send(ServerFrame::Joined {
                        peer_id: peer_id.as_str().to_string(),
                        peers,
                    })
                    .await;
                return Some((peer_id, room));
            }
            Ok(_) => {
                let _ = out_tx
                    .send(ServerFrame::error("bad_request", "must join a room first"))
                    .await;
            }
            Err(e) => {
                warn!(error = %e, "malformed join frame");
                let _ = out_tx
                    .send(ServerFrame::error("bad_request", "malformed frame"))
                    .await;
            }
        }
    }
}

async fn handle_frame(
    hub: &Arc<Hub>,
    peer_id: &PeerId,
    room: &RoomName,
    frame: ClientFrame,
    out_tx: &mpsc::Sender<ServerFrame>,
) {
    match frame {
        ClientFrame::Join { .. } => {
            let _ = out_tx
                .send(ServerFrame::error("bad_request", "already joined"))
                .await;
        }
        ClientFrame::Leave => {}
        ClientFrame::Offer { to, payload } => {
            route_signal(hub, peer_id, &to, ServerFrame::Offer { from: peer_id.as_str().to_string(), payload }, out_tx).await;
        }
        ClientFrame::Answer { to, payload } => {
            route_signal(hub, peer_id, &to, ServerFrame::Answer { from: peer_id.as_str().to_string(), payload }, out_tx).await;
        }
        ClientFrame::Ice { to, payload } => {
            route_signal(hub, peer_id, &to, ServerFrame::Ice { from: peer_id.as_str().to_string(), payload }, out_tx).await;
        }
        ClientFrame::Transcript {
            speaker,
            text,
            ts: _,
            confidence,
        } => {
            let speaker_role = SpeakerRole::from_str(&speaker).unwrap_or_default();
            if let Err(err) = hub
                .ingest_transcript(room, speaker_role, speaker, text, confidence)
                .await
            {
                warn!(peer = %peer_id, error = %err, "transcript rejected");
                let _ = out_tx.send(ServerFrame::error(err.code(), err.to_string())).await;
            }
        }
    }
}

async fn route_signal(
    hub: &Arc<Hub>,
    from: &PeerId,
    to: &str,
    frame: ServerFrame,
    out_tx: &mpsc::Sender<ServerFrame>,
) {
    let target = PeerId(to.to_string());
    if let Err(err) = hub.route_to(from, &target, frame).await {
        let _ = out_tx.send(ServerFrame::error(err.code(), err.to_string())).await;
    }
}

/// Drains `out_rx` onto the WebSocket sink for the lifetime of the
/// connection. Ends when the peer's sender is dropped or the socket write
/// fails.
async fn forward_outbound(
    mut ws_tx: futures_util::stream::SplitSink<WebSocket, Message>,
    mut out_rx: mpsc::Receiver<ServerFrame>,
) {
    while let Some(frame) = out_rx.recv().await {
        let json = serde_json::to_string(&frame).unwrap_or_default();
        if ws_tx.send(Message::Text(json.into())).await.is_err() {
            break;
        }
    }
}
