use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::error::storage;
use crate::messaging::store;
use crate::state::AppState;
use crate::ws::protocol::{self, ServerEvent};
use crate::ws::ConnectionSender;

/// Ping interval: server sends WebSocket ping every 30 seconds.
/// Prevents connection leaks from abrupt disconnects.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if pong not received within 10 seconds after ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the actor-per-connection pattern for an authenticated WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Reader task: processes incoming frames, dispatches to protocol handlers
///
/// The mpsc channel allows any part of the system to push events to this
/// client by cloning the sender.
pub async fn run_connection(socket: WebSocket, state: AppState, participant_id: String) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    // Register this connection in the connection registry
    register_connection(&state, &participant_id, tx.clone());

    // Reconnect-gap reconciliation: push the current unread total so a client
    // that missed unreadCountUpdated events while disconnected catches up
    // without waiting for its next poll.
    {
        let db = state.db.clone();
        let pid = participant_id.clone();
        let unread = tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(storage)?;
            store::total_unread(&conn, &pid).map_err(storage)
        })
        .await
        .ok()
        .and_then(|r| r.ok());

        if let Some(unread_count) = unread {
            protocol::send_event(&tx, &ServerEvent::UnreadCountUpdated { unread_count });
        }
    }

    tracing::info!(participant_id = %participant_id, "WebSocket actor started");

    // Spawn writer task: forwards mpsc messages to WebSocket sink
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Track pong reception
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    // Spawn ping task: sends periodic pings and monitors pong responses
    let ping_tx = tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            // Send ping
            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died — connection is gone
                break;
            }

            // Wait for pong within timeout
            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {
                    // Pong received, continue
                }
                _ => {
                    // Pong timeout or channel closed — close connection
                    tracing::warn!("Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    // Reader loop: process incoming WebSocket messages
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    protocol::handle_text_message(&text, &tx, &state, &participant_id);
                }
                Message::Binary(_) => {
                    // The protocol is JSON text frames; binary is ignored
                    tracing::debug!(
                        participant_id = %participant_id,
                        "received unexpected binary frame"
                    );
                }
                Message::Pong(_) => {
                    // Pong received — notify the ping task
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    // Respond to client pings with pong
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        participant_id = %participant_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    participant_id = %participant_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                // Stream ended — client disconnected
                tracing::info!(participant_id = %participant_id, "WebSocket stream ended");
                break;
            }
        }
    }

    // Cleanup: abort writer and ping tasks
    writer_handle.abort();
    ping_handle.abort();

    // Remove this connection from the registry
    unregister_connection(&state, &participant_id);

    tracing::info!(participant_id = %participant_id, "WebSocket actor stopped");
}

/// Writer task: receives messages from mpsc channel and forwards them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken
            break;
        }
    }
}

/// Register a connection sender in the connection registry.
fn register_connection(state: &AppState, participant_id: &str, tx: ConnectionSender) {
    state
        .connections
        .entry(participant_id.to_string())
        .or_default()
        .push(tx);

    let conn_count = state
        .connections
        .get(participant_id)
        .map(|v| v.len())
        .unwrap_or(0);
    tracing::debug!(
        participant_id = %participant_id,
        connections = conn_count,
        "Connection registered"
    );
}

/// Remove closed connections from the registry for a participant.
/// After the reader loop exits, the tx sender is dropped, so any
/// corresponding receivers are closed. We remove senders that are closed.
fn unregister_connection(state: &AppState, participant_id: &str) {
    let mut remove_participant = false;

    if let Some(mut connections) = state.connections.get_mut(participant_id) {
        // Remove senders that are closed (the receiver has been dropped)
        connections.retain(|sender| !sender.is_closed());
        if connections.is_empty() {
            remove_participant = true;
        }
    }

    if remove_participant {
        state.connections.remove(participant_id);
    }

    tracing::debug!(participant_id = %participant_id, "Connection unregistered");
}
