//! services/api/src/web/sessions.rs
//!
//! Study-session lifecycle endpoints: start, list, fetch, end, and the
//! append-only interaction log.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use studypulse_core::analytics::calculate_final_metrics;
use studypulse_core::domain::{FinalMetrics, NewInteraction, Session};
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::middleware::CurrentUser;
use crate::web::rest::{owned_session, port_failure, success, Failure};
use crate::web::state::AppState;

//=========================================================================================
// Request Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub subject: Option<String>,
}

#[derive(Deserialize)]
pub struct AddInteractionsRequest {
    pub interactions: Vec<NewInteraction>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Start a new study session for the caller.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = CreateSessionRequest,
    responses(
        (status = 201, description = "Session started"),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Response, Failure> {
    let session = state
        .db
        .create_session(user_id, req.subject.as_deref())
        .await
        .map_err(|e| port_failure("create session", e))?;
    info!(session_id = %session.id, "Started study session");
    Ok(success(StatusCode::CREATED, session))
}

/// List the caller's sessions, newest first.
#[utoipa::path(
    get,
    path = "/sessions",
    responses(
        (status = 200, description = "Sessions for the caller"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_sessions_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Response, Failure> {
    let sessions = state
        .db
        .get_sessions_by_user(user_id)
        .await
        .map_err(|e| port_failure("list sessions", e))?;
    Ok(success(StatusCode::OK, sessions))
}

/// Fetch one session, including its cached metrics and summary once ended.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "The session"),
        (status = 404, description = "Unknown or unowned session")
    )
)]
pub async fn get_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(session_id): Path<Uuid>,
) -> Result<Response, Failure> {
    let session = owned_session(&state, session_id, user_id).await?;
    Ok(success(StatusCode::OK, session))
}

/// End a session: win the active -> ended transition, aggregate the final
/// metrics snapshot, and kick off the post-session summary.
#[utoipa::path(
    post,
    path = "/sessions/{id}/end",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session ended; final metrics attached"),
        (status = 404, description = "Unknown or unowned session"),
        (status = 409, description = "Session already ended")
    )
)]
pub async fn end_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(session_id): Path<Uuid>,
) -> Result<Response, Failure> {
    let session = owned_session(&state, session_id, user_id).await?;
    if !session.is_active {
        return Err(Failure::conflict("Session has already ended"));
    }

    let ended_at = Utc::now();
    let duration_seconds = (ended_at - session.started_at).num_seconds().max(0);

    // Only the request that wins the compare-and-swap aggregates; a
    // concurrent end request sees the swap fail and backs off.
    let won = state
        .db
        .end_session(session_id, ended_at, duration_seconds)
        .await
        .map_err(|e| port_failure("end session", e))?;
    if !won {
        return Err(Failure::conflict("Session has already ended"));
    }

    let samples = state
        .db
        .get_samples_for_session(session_id)
        .await
        .map_err(|e| port_failure("load samples", e))?;
    let interactions = state
        .db
        .get_interactions_for_session(session_id)
        .await
        .map_err(|e| port_failure("load interactions", e))?;

    let ended = Session {
        ended_at: Some(ended_at),
        is_active: false,
        duration_seconds,
        ..session
    };
    let metrics = calculate_final_metrics(&ended, &samples, &interactions);
    state
        .db
        .store_final_metrics(session_id, &metrics)
        .await
        .map_err(|e| port_failure("store final metrics", e))?;

    spawn_summary_task(&state, &ended, &metrics);

    Ok(success(
        StatusCode::OK,
        json!({
            "session_id": session_id,
            "ended_at": ended_at,
            "duration_seconds": duration_seconds,
            "metrics": metrics,
        }),
    ))
}

/// Fires the AI summary in the background. A failed summarization is logged
/// and dropped; it never blocks or rolls back the end-session response.
fn spawn_summary_task(state: &Arc<AppState>, session: &Session, metrics: &FinalMetrics) {
    let Some(adapter) = state.summary_adapter.clone() else {
        return;
    };
    let db = state.db.clone();
    let session = session.clone();
    let metrics = metrics.clone();
    tokio::spawn(async move {
        match adapter.summarize_session(&session, &metrics).await {
            Ok(text) => {
                if let Err(e) = db.store_session_summary(session.id, &text).await {
                    error!(session_id = %session.id, "Failed to store session summary: {e}");
                }
            }
            Err(e) => {
                error!(session_id = %session.id, "Failed to generate session summary: {e}");
            }
        }
    });
}

/// Append interactions (highlights, page turns, breaks, ...) to an active
/// session.
#[utoipa::path(
    post,
    path = "/sessions/{id}/interactions",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body(content_type = "application/json", description = "Interaction list to append."),
    responses(
        (status = 201, description = "Interactions recorded"),
        (status = 400, description = "Empty interaction list"),
        (status = 404, description = "Unknown or unowned session"),
        (status = 409, description = "Session has already ended")
    )
)]
pub async fn add_interactions_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<AddInteractionsRequest>,
) -> Result<Response, Failure> {
    if req.interactions.is_empty() {
        return Err(Failure::bad_request("Validation failed")
            .with_detail(json!({ "interactions": "must contain at least one entry" })));
    }

    let session = owned_session(&state, session_id, user_id).await?;
    if !session.is_active {
        return Err(Failure::conflict("Session has already ended"));
    }

    let recorded = state
        .db
        .insert_interactions(session_id, user_id, req.interactions)
        .await
        .map_err(|e| port_failure("record interactions", e))?;
    Ok(success(StatusCode::CREATED, json!({ "recorded": recorded })))
}
