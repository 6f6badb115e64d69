//! Message dispatch and transcript endpoints.
//!
//! The send path is the Message Dispatcher: validate the body, check the
//! sender/receiver pair is an assigned user↔case-manager relationship,
//! persist through the conversation store, then push `newMessage` and the
//! receiver's refreshed unread total to any live connections. A receiver
//! with no live connection gets nothing pushed — the message surfaces on
//! their next history fetch or unread poll.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::middleware::Claims;
use crate::db::models::{MessageRow, Participant, Role};
use crate::error::{storage, ApiError};
use crate::messaging::{keys, store};
use crate::state::AppState;
use crate::ws::broadcast::send_to_user;
use crate::ws::protocol::ServerEvent;

/// Maximum message body length (chars).
const MAX_BODY_LENGTH: usize = 4000;

// --- Request / Response types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub receiver_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
    pub is_from_case_manager: bool,
    pub read: bool,
    /// Unix milliseconds
    pub created_at: i64,
}

impl From<MessageRow> for MessageResponse {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            text: row.body,
            is_from_case_manager: row.is_from_case_manager,
            read: row.read,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub success: bool,
    pub message: MessageResponse,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub success: bool,
    pub messages: Vec<MessageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    pub conversation_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadResponse {
    pub success: bool,
    pub unread_count: i64,
}

// --- Authorization ---

/// Validate that (sender, receiver) form an assigned user↔case-manager pair.
/// Returns the two participants and whether the message flows from the
/// case-manager side. Admins may act as case managers for users assigned
/// to them.
fn authorize_pair(
    conn: &Connection,
    sender_id: &str,
    receiver_id: &str,
) -> Result<(Participant, Participant, bool), ApiError> {
    let sender = store::get_participant(conn, sender_id)
        .map_err(storage)?
        .ok_or_else(|| ApiError::NotFound("Sender not found".to_string()))?;
    let receiver = store::get_participant(conn, receiver_id)
        .map_err(storage)?
        .ok_or_else(|| ApiError::NotFound("Recipient not found".to_string()))?;

    let is_from_case_manager = match (sender.role, receiver.role) {
        (Role::User, r) if r.is_case_manager_side() => {
            if sender.assigned_case_manager.as_deref() != Some(receiver_id) {
                return Err(ApiError::Authorization(
                    "You can only message your assigned case manager".to_string(),
                ));
            }
            false
        }
        (s, Role::User) if s.is_case_manager_side() => {
            if receiver.assigned_case_manager.as_deref() != Some(sender_id) {
                return Err(ApiError::Authorization(
                    "This user is not assigned to you".to_string(),
                ));
            }
            true
        }
        _ => {
            return Err(ApiError::Authorization(
                "Messages flow between a user and their assigned case manager".to_string(),
            ))
        }
    };

    Ok((sender, receiver, is_from_case_manager))
}

// --- Handlers ---

/// POST /messages/send — Send a message to the other side of the relationship.
/// Body: { "receiverId": "...", "text": "..." }
pub async fn send_message(
    State(state): State<AppState>,
    claims: Claims,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<SendMessageResponse>), ApiError> {
    let text = body.text.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::Validation("Message body must not be empty".to_string()));
    }
    if text.chars().count() > MAX_BODY_LENGTH {
        return Err(ApiError::Validation(format!(
            "Message body exceeds {} characters",
            MAX_BODY_LENGTH
        )));
    }

    let now_millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64;

    let row = MessageRow {
        id: uuid::Uuid::now_v7().to_string(),
        conversation_id: keys::derive_key(&claims.sub, &body.receiver_id),
        sender_id: claims.sub.clone(),
        receiver_id: body.receiver_id.clone(),
        body: text,
        is_from_case_manager: false, // set below once the pair is validated
        read: false,
        created_at: now_millis,
    };

    let db = state.db.clone();
    let (row, receiver_unread) = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(storage)?;

        let (_, _, is_from_case_manager) =
            authorize_pair(&conn, &row.sender_id, &row.receiver_id)?;
        let row = MessageRow {
            is_from_case_manager,
            ..row
        };

        // Persist before any push: an unsaved message is never delivered
        store::append(&conn, &row).map_err(storage)?;

        let unread = store::total_unread(&conn, &row.receiver_id).map_err(storage)?;
        Ok::<_, ApiError>((row, unread))
    })
    .await
    .map_err(storage)??;

    let message = MessageResponse::from(row);

    // Push to the receiver's live connections, if any. Absence is not an
    // error: the store is authoritative and polling picks the message up.
    send_to_user(
        &state.connections,
        &message.receiver_id,
        &ServerEvent::NewMessage {
            message: message.clone(),
        },
    );
    send_to_user(
        &state.connections,
        &message.receiver_id,
        &ServerEvent::UnreadCountUpdated {
            unread_count: receiver_unread,
        },
    );

    // Sender's other devices/tabs see the message too; their unread state
    // is unaffected.
    send_to_user(
        &state.connections,
        &message.sender_id,
        &ServerEvent::NewMessage {
            message: message.clone(),
        },
    );

    tracing::debug!(
        conversation_id = %message.conversation_id,
        message_id = %message.id,
        "message dispatched"
    );

    Ok((StatusCode::CREATED, Json(SendMessageResponse { success: true, message })))
}

/// GET /messages/conversation — Fetch a transcript, oldest first.
/// A user omits the query and gets the thread with their assigned case
/// manager. A case manager passes ?userId=<id> for one assigned user.
pub async fn get_conversation(
    State(state): State<AppState>,
    claims: Claims,
    Query(query): Query<ConversationQuery>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let db = state.db.clone();
    let caller_id = claims.sub.clone();

    let messages = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(storage)?;

        let caller = store::get_participant(&conn, &caller_id)
            .map_err(storage)?
            .ok_or(ApiError::Unauthenticated)?;

        let other_id = match (&caller.role, &query.user_id) {
            (Role::User, None) => caller
                .assigned_case_manager
                .clone()
                .ok_or_else(|| {
                    ApiError::Authorization("No case manager assigned yet".to_string())
                })?,
            (role, Some(user_id)) if role.is_case_manager_side() => {
                let user = store::get_participant(&conn, user_id)
                    .map_err(storage)?
                    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
                if user.assigned_case_manager.as_deref() != Some(caller_id.as_str()) {
                    return Err(ApiError::Authorization(
                        "This user is not assigned to you".to_string(),
                    ));
                }
                user.id
            }
            (Role::User, Some(_)) => {
                return Err(ApiError::Authorization(
                    "Users fetch only their own thread".to_string(),
                ))
            }
            _ => {
                return Err(ApiError::Validation(
                    "Case managers must specify userId".to_string(),
                ))
            }
        };

        let rows = store::history(&conn, &caller_id, &other_id).map_err(storage)?;
        Ok::<_, ApiError>(rows.into_iter().map(MessageResponse::from).collect())
    })
    .await
    .map_err(storage)??;

    Ok(Json(ConversationResponse {
        success: true,
        messages,
    }))
}

/// PUT /messages/read — Mark a whole conversation read for the caller.
/// Body: { "conversationId": "<a>_<b>" }. Idempotent. Pushes the caller's
/// refreshed total so their other tabs update without polling.
pub async fn mark_read(
    State(state): State<AppState>,
    claims: Claims,
    Json(body): Json<MarkReadRequest>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    // The caller must be one of the two participants in the key
    if keys::counterpart(&body.conversation_id, &claims.sub).is_none() {
        return Err(ApiError::Authorization(
            "Not a participant in this conversation".to_string(),
        ));
    }

    let db = state.db.clone();
    let caller_id = claims.sub.clone();
    let conversation_id = body.conversation_id.clone();

    let total = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(storage)?;
        let flipped = store::mark_read(&conn, &conversation_id, &caller_id).map_err(storage)?;
        let total = store::total_unread(&conn, &caller_id).map_err(storage)?;
        if flipped > 0 {
            tracing::debug!(
                conversation_id = %conversation_id,
                flipped = flipped,
                "conversation marked read"
            );
        }
        Ok::<_, ApiError>(total)
    })
    .await
    .map_err(storage)??;

    // Self-refresh: marking read is triggered by this participant's own UI
    send_to_user(
        &state.connections,
        &claims.sub,
        &ServerEvent::UnreadCountUpdated { unread_count: total },
    );

    Ok(Json(MarkReadResponse {
        success: true,
        unread_count: total,
    }))
}
