//! Pseudonymous account registration.
//!
//! HealthHub identities are anonymous: a registration is a unique username and
//! an optional contact email, nothing else. The response carries the access
//! token the client uses for every REST call and the WebSocket upgrade.
//! Hardened identity bootstrap (passwords, recovery, invites) is an external
//! concern and deliberately absent here.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::auth::jwt;
use crate::db::models::Role;
use crate::error::{storage, ApiError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: Option<String>,
    /// "user" (default) | "case_manager" | "admin"
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub role: String,
    pub assigned_case_manager: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub success: bool,
    pub token: String,
    pub participant: ParticipantResponse,
}

/// POST /auth/register — Create a pseudonymous participant and issue a JWT.
/// Body: { "username": "...", "email": null, "role": "user" }
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let username = body.username.trim().to_string();
    if username.is_empty() {
        return Err(ApiError::Validation("Username must not be empty".to_string()));
    }

    let role = match &body.role {
        Some(r) => Role::from_str(r)
            .ok_or_else(|| ApiError::Validation(format!("Unknown role: {}", r)))?,
        None => Role::User,
    };

    let db = state.db.clone();
    let email = body.email.clone();
    let participant_id = uuid::Uuid::now_v7().to_string();
    let pid = participant_id.clone();
    let uname = username.clone();

    tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(storage)?;

        let taken: bool = conn
            .query_row(
                "SELECT COUNT(*) FROM participants WHERE username = ?1",
                rusqlite::params![uname],
                |row| row.get::<_, i64>(0),
            )
            .map_err(storage)?
            > 0;
        if taken {
            return Err(ApiError::Validation("Username already taken".to_string()));
        }

        conn.execute(
            "INSERT INTO participants (id, username, email, role, created_at)
             VALUES (?1, ?2, ?3, ?4, datetime('now'))",
            rusqlite::params![pid, uname, email, role.as_str()],
        )
        .map_err(storage)?;

        Ok(())
    })
    .await
    .map_err(storage)??;

    let token = jwt::issue_access_token(
        &state.jwt_secret,
        &participant_id,
        &username,
        role.as_str(),
    )
    .map_err(storage)?;

    tracing::info!(
        participant_id = %participant_id,
        role = role.as_str(),
        "participant registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            token,
            participant: ParticipantResponse {
                id: participant_id,
                username,
                email: body.email,
                role: role.as_str().to_string(),
                assigned_case_manager: None,
            },
        }),
    ))
}
