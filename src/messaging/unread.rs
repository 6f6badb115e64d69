//! Unread-count polling endpoint.
//!
//! Pushes keep unread badges current while a connection is live; this
//! endpoint is the reconciliation fallback the client polls every 30s to
//! correct for missed pushes (reconnect gaps). The number returned here and
//! the number pushed in `unreadCountUpdated` come from the same store query.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::auth::middleware::Claims;
use crate::error::{storage, ApiError};
use crate::messaging::store;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountResponse {
    pub success: bool,
    pub unread_count: i64,
}

/// GET /messages/unread-count — Authoritative total unread for the caller.
pub async fn unread_count(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let db = state.db.clone();
    let caller_id = claims.sub.clone();

    let total = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(storage)?;
        store::total_unread(&conn, &caller_id).map_err(storage)
    })
    .await
    .map_err(storage)??;

    Ok(Json(UnreadCountResponse {
        success: true,
        unread_count: total,
    }))
}
