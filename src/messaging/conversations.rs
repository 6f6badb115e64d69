//! Case-manager conversation listing.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::auth::middleware::Claims;
use crate::error::{storage, ApiError};
use crate::messaging::store;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadBreakdown {
    pub case_manager: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummaryResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: ConversationUser,
    pub last_message: Option<String>,
    pub last_message_time: Option<i64>,
    pub unread_count: UnreadBreakdown,
}

#[derive(Debug, Serialize)]
pub struct ListConversationsResponse {
    pub success: bool,
    pub conversations: Vec<ConversationSummaryResponse>,
}

/// GET /messages/conversations — One row per assigned user with last-message
/// preview and the case-manager-side unread count, most recent activity first.
/// Case managers and admins only.
pub async fn list_conversations(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<ListConversationsResponse>, ApiError> {
    let role = claims.role().ok_or(ApiError::Unauthenticated)?;
    if !role.is_case_manager_side() {
        return Err(ApiError::Authorization(
            "Only case managers list conversations".to_string(),
        ));
    }

    let db = state.db.clone();
    let caller_id = claims.sub.clone();

    let summaries = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(storage)?;
        store::list_for_case_manager(&conn, &caller_id).map_err(storage)
    })
    .await
    .map_err(storage)??;

    let conversations = summaries
        .into_iter()
        .map(|s| ConversationSummaryResponse {
            id: s.conversation_id,
            user_id: ConversationUser {
                id: s.user.id,
                username: s.user.username,
                email: s.user.email,
            },
            last_message: s.last_message,
            last_message_time: s.last_message_time,
            unread_count: UnreadBreakdown {
                case_manager: s.unread_for_case_manager,
            },
        })
        .collect();

    Ok(Json(ListConversationsResponse {
        success: true,
        conversations,
    }))
}
