//! JSON wire protocol for the WebSocket channel.
//!
//! Frames are text, shaped `{"type": "...", "payload": {...}}`. Server→client
//! events mirror what the REST layer persists; client→server frames are room
//! joins (acked) and typing signals (relayed, never stored).

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::messaging::messages::MessageResponse;
use crate::messaging::typing;
use crate::state::AppState;

/// Events pushed from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerEvent {
    #[serde(rename = "newMessage")]
    NewMessage { message: MessageResponse },
    #[serde(rename = "userTyping")]
    #[serde(rename_all = "camelCase")]
    UserTyping {
        conversation_id: String,
        is_typing: bool,
    },
    #[serde(rename = "unreadCountUpdated")]
    #[serde(rename_all = "camelCase")]
    UnreadCountUpdated { unread_count: i64 },
    #[serde(rename = "room_joined")]
    RoomJoined { room: String },
    #[serde(rename = "error")]
    Error { code: u16, message: String },
}

/// Frames sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientEvent {
    #[serde(rename = "join_user_room")]
    #[serde(rename_all = "camelCase")]
    JoinUserRoom { user_id: String },
    #[serde(rename = "join_chat")]
    #[serde(rename_all = "camelCase")]
    JoinChat { user_id: String },
    #[serde(rename = "typing")]
    #[serde(rename_all = "camelCase")]
    Typing {
        conversation_id: String,
        user_id: String,
        is_typing: bool,
    },
}

/// Handle an incoming text frame: decode the event and dispatch.
pub fn handle_text_message(
    text: &str,
    tx: &mpsc::UnboundedSender<Message>,
    state: &AppState,
    participant_id: &str,
) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(
                participant_id = %participant_id,
                error = %e,
                "failed to decode client frame"
            );
            send_event(
                tx,
                &ServerEvent::Error {
                    code: 400,
                    message: "Invalid frame".to_string(),
                },
            );
            return;
        }
    };

    match event {
        // Registration already placed this connection in its personal room;
        // the joins exist as explicit acks for the client's connect sequence.
        ClientEvent::JoinUserRoom { .. } => {
            send_event(
                tx,
                &ServerEvent::RoomJoined {
                    room: participant_id.to_string(),
                },
            );
        }
        ClientEvent::JoinChat { .. } => {
            send_event(
                tx,
                &ServerEvent::RoomJoined {
                    room: format!("chat:{}", participant_id),
                },
            );
        }
        ClientEvent::Typing {
            conversation_id,
            is_typing,
            ..
        } => {
            // The authenticated identity is the sender, whatever the frame claims
            typing::relay_typing(state, participant_id, &conversation_id, is_typing);
        }
    }
}

/// Serialize and send a single event to one connection channel.
pub fn send_event(tx: &mpsc::UnboundedSender<Message>, event: &ServerEvent) {
    if let Ok(json) = serde_json::to_string(event) {
        let _ = tx.send(Message::Text(json.into()));
    }
}
