//! services/api/src/web/rest.rs
//!
//! Shared REST plumbing: the `{success, data}` response envelope used by
//! every endpoint, the translation from port errors to HTTP failures, and
//! the master definition for the OpenAPI specification.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use studypulse_core::domain::Session;
use studypulse_core::ports::PortError;
use tracing::error;
use utoipa::OpenApi;
use uuid::Uuid;

use crate::web::state::AppState;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        crate::web::sessions::create_session_handler,
        crate::web::sessions::list_sessions_handler,
        crate::web::sessions::get_session_handler,
        crate::web::sessions::end_session_handler,
        crate::web::sessions::add_interactions_handler,
        crate::web::metrics::ingest_sample_handler,
        crate::web::metrics::ingest_batch_handler,
        crate::web::metrics::session_summary_handler,
        crate::web::metrics::session_trend_handler,
        crate::web::metrics::session_anomalies_handler,
        crate::web::analytics::overview_handler,
        crate::web::analytics::productivity_handler,
    ),
    components(
        schemas(
            crate::web::auth::SignupRequest,
            crate::web::auth::LoginRequest,
            crate::web::auth::AuthResponse,
            crate::web::sessions::CreateSessionRequest,
        )
    ),
    tags(
        (name = "StudyPulse API", description = "API endpoints for study-session engagement tracking.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Response Envelope
//=========================================================================================

/// Wraps a payload in the `{"success": true, "data": ...}` envelope.
pub fn success<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, Json(json!({ "success": true, "data": data }))).into_response()
}

/// A failed request, rendered as `{"success": false, "message": ..., "error"?: ...}`.
#[derive(Debug)]
pub struct Failure {
    pub status: StatusCode,
    pub message: String,
    pub detail: Option<Value>,
}

impl Failure {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            detail: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Attaches field-level error detail for validation failures.
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let mut body = json!({ "success": false, "message": self.message });
        if let Some(detail) = self.detail {
            body["error"] = detail;
        }
        (self.status, Json(body)).into_response()
    }
}

/// Translates a `PortError` into an HTTP failure, logging unexpected ones
/// with the action that produced them.
pub fn port_failure(action: &str, error: PortError) -> Failure {
    match error {
        PortError::NotFound(message) => Failure::not_found(message),
        PortError::Unauthorized => Failure::unauthorized("Not authenticated"),
        PortError::Conflict(message) => Failure::conflict(message),
        PortError::Unexpected(message) => {
            error!("Failed to {action}: {message}");
            Failure::internal(format!("Failed to {action}"))
        }
    }
}

/// Loads a session and checks it belongs to the caller. Ownership failures
/// deliberately read the same as nonexistence.
pub async fn owned_session(
    state: &Arc<AppState>,
    session_id: Uuid,
    user_id: Uuid,
) -> Result<Session, Failure> {
    let session = state
        .db
        .get_session_by_id(session_id)
        .await
        .map_err(|e| port_failure("load session", e))?;
    if session.user_id != user_id {
        return Err(Failure::not_found(format!("Session {session_id} not found")));
    }
    Ok(session)
}
