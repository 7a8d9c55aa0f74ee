//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};

use crate::{
    domain::{ConnectionId, Outbound, PusherChannel, PusherReceivers},
    infrastructure::dto::websocket::{ClientEvent, HandshakeQuery},
    ui::state::AppState,
    usecase::Handshake,
};

/// `GET /ws?token=..&role=host|viewer`
///
/// The upgrade always succeeds; authentication and role checks happen in the
/// dispatcher so that a rejected peer still receives its `auth_result`.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<HandshakeQuery>,
) -> impl IntoResponse {
    let id = ConnectionId::generate();
    let handshake = Handshake {
        token: query.token,
        role: query.role,
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, id, handshake))
}

/// Spawns the writer task of one connection.
///
/// The control lane is polled first so that commands and state changes are
/// never starved by a stream of frames. `Outbound::Close` (or the relay
/// dropping the channel) sends a close frame and ends the task.
fn pusher_loop(
    mut outbound: PusherReceivers,
    mut sender: SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                biased;
                item = outbound.control.recv() => match item {
                    Some(Outbound::Text(text)) => Message::Text(text.into()),
                    Some(Outbound::Close) | None => {
                        let _ = sender.send(Message::Close(None)).await;
                        break;
                    }
                },
                Some(frame) = outbound.telemetry.recv() => Message::Text(frame.into()),
            };
            if sender.send(message).await.is_err() {
                break;
            }
        }
    })
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    id: ConnectionId,
    handshake: Handshake,
) {
    let (sender, mut receiver) = socket.split();

    let (channel, outbound) = PusherChannel::new(state.telemetry_buffer);
    state.relay.connect(id, handshake, channel);
    tracing::info!("Connection '{}' opened", id);

    let relay = state.relay.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error on '{}': {}", id, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => relay.inbound(id, event),
                    Err(e) => relay.malformed(id, e.to_string()),
                },
                Message::Ping(_) => {
                    tracing::debug!("Received ping from '{}'", id);
                }
                Message::Close(_) => {
                    tracing::info!("Connection '{}' requested close", id);
                    break;
                }
                _ => {}
            }
        }
    });

    let mut send_task = pusher_loop(outbound, sender);

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    state.relay.disconnect(id);
    tracing::info!("Connection '{}' closed", id);
}
