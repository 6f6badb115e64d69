//! Case-manager assignment.
//!
//! The selection policy (workload balancing etc.) lives outside this core;
//! this endpoint is only the mutation the messaging authorization check
//! depends on. Reassignment repoints future messages to the new pair's
//! conversation key — existing history stays under the old key.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::Claims;
use crate::db::models::Role;
use crate::error::{storage, ApiError};
use crate::messaging::store;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub user_id: String,
    pub case_manager_id: String,
}

#[derive(Debug, Serialize)]
pub struct AssignResponse {
    pub success: bool,
}

/// PUT /admin/assign — Assign (or reassign) a user's case manager. Admin only.
/// Body: { "userId": "...", "caseManagerId": "..." }
pub async fn assign_case_manager(
    State(state): State<AppState>,
    claims: Claims,
    Json(body): Json<AssignRequest>,
) -> Result<Json<AssignResponse>, ApiError> {
    if claims.role() != Some(Role::Admin) {
        return Err(ApiError::Authorization(
            "Only admins assign case managers".to_string(),
        ));
    }

    let db = state.db.clone();
    let user_id = body.user_id.clone();
    let cm_id = body.case_manager_id.clone();

    tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(storage)?;

        let user = store::get_participant(&conn, &user_id)
            .map_err(storage)?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;
        if user.role != Role::User {
            return Err(ApiError::Validation(
                "Only users receive case-manager assignments".to_string(),
            ));
        }

        let cm = store::get_participant(&conn, &cm_id)
            .map_err(storage)?
            .ok_or_else(|| ApiError::NotFound("Case manager not found".to_string()))?;
        if !cm.role.is_case_manager_side() {
            return Err(ApiError::Validation(
                "Assignee must be a case manager".to_string(),
            ));
        }

        conn.execute(
            "UPDATE participants SET assigned_case_manager = ?1 WHERE id = ?2",
            rusqlite::params![cm_id, user_id],
        )
        .map_err(storage)?;

        tracing::info!(user_id = %user_id, case_manager_id = %cm_id, "case manager assigned");
        Ok(())
    })
    .await
    .map_err(storage)??;

    Ok(Json(AssignResponse { success: true }))
}
