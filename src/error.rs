//! Error taxonomy for the messaging core.
//!
//! Every REST handler returns `Result<_, ApiError>`. The variants map to the
//! failure classes the client distinguishes: bad input, a sender/receiver pair
//! that is not an assigned relationship, missing auth, and persistence failure.
//! Transport failures (no live WebSocket connection) are deliberately NOT an
//! error — delivery degrades to the receiver's next poll.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    /// Request payload failed validation (empty message body, bad role, ...)
    Validation(String),
    /// Caller is authenticated but the operation is not theirs to perform
    Authorization(String),
    /// Missing or invalid bearer token
    Unauthenticated,
    /// Referenced participant or conversation does not exist
    NotFound(String),
    /// Persistence failure; the operation was aborted before any push
    Storage(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Authorization(_) => StatusCode::FORBIDDEN,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            ApiError::Validation(msg)
            | ApiError::Authorization(msg)
            | ApiError::NotFound(msg)
            | ApiError::Storage(msg) => msg,
            ApiError::Unauthenticated => "Authentication required",
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Storage(msg) = &self {
            tracing::error!(error = %msg, "storage failure");
        }
        let body = Json(json!({
            "success": false,
            "error": self.message(),
        }));
        (self.status(), body).into_response()
    }
}

/// Map a poisoned-lock or spawn_blocking join failure to a StorageError.
pub fn storage<E: std::fmt::Display>(err: E) -> ApiError {
    ApiError::Storage(format!("database error: {}", err))
}
