//! services/api/src/web/metrics.rs
//!
//! Webcam sample ingestion and the per-session read-side analytics:
//! final-metrics summary, bucketed engagement trend, and anomaly listing.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    Extension, Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use studypulse_core::analytics::{
    calculate_final_metrics, detect_anomalies, engagement_trend, DEFAULT_TREND_INTERVAL_MINUTES,
};
use studypulse_core::domain::{normalize_sample, NewSample, Session};
use uuid::Uuid;

use crate::web::middleware::CurrentUser;
use crate::web::rest::{owned_session, port_failure, success, Failure};
use crate::web::state::AppState;

//=========================================================================================
// Request Types
//=========================================================================================

#[derive(Deserialize)]
pub struct IngestBatchRequest {
    pub samples: Vec<NewSample>,
}

#[derive(Deserialize)]
pub struct TrendQuery {
    /// Bucket width in minutes; defaults to five.
    pub interval: Option<i64>,
}

//=========================================================================================
// Ingestion Helpers
//=========================================================================================

/// Checks the target session is the caller's and still recording.
async fn writable_session(
    state: &Arc<AppState>,
    session_id: Uuid,
    user_id: Uuid,
) -> Result<Session, Failure> {
    let session = owned_session(state, session_id, user_id).await?;
    if !session.is_active {
        return Err(Failure::conflict("Session has already ended"));
    }
    Ok(session)
}

/// The reference instant for the break policy: the latest `break_end`
/// interaction, falling back to the session start.
async fn last_break_at(
    state: &Arc<AppState>,
    session: &Session,
) -> Result<DateTime<Utc>, Failure> {
    let last_break = state
        .db
        .get_last_break_end(session.id)
        .await
        .map_err(|e| port_failure("load break history", e))?;
    Ok(last_break.unwrap_or(session.started_at))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Append one webcam sample to its session.
#[utoipa::path(
    post,
    path = "/metrics",
    request_body(content_type = "application/json", description = "One webcam observation."),
    responses(
        (status = 201, description = "Sample recorded"),
        (status = 400, description = "Malformed sample"),
        (status = 404, description = "Unknown or unowned session"),
        (status = 409, description = "Session has already ended")
    )
)]
pub async fn ingest_sample_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(mut sample): Json<NewSample>,
) -> Result<Response, Failure> {
    let session = writable_session(&state, sample.session_id, user_id).await?;
    normalize_sample(&mut sample, last_break_at(&state, &session).await?);

    let created = state
        .db
        .insert_sample(user_id, sample)
        .await
        .map_err(|e| port_failure("record sample", e))?;
    Ok(success(StatusCode::CREATED, created))
}

/// Append a batch of webcam samples. The whole batch is validated before
/// anything is written; a failed batch persists nothing.
#[utoipa::path(
    post,
    path = "/metrics/batch",
    request_body(content_type = "application/json", description = "Batch of webcam observations."),
    responses(
        (status = 201, description = "Batch recorded; count returned"),
        (status = 400, description = "Empty or malformed batch"),
        (status = 404, description = "Unknown or unowned session"),
        (status = 409, description = "Session has already ended")
    )
)]
pub async fn ingest_batch_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(req): Json<IngestBatchRequest>,
) -> Result<Response, Failure> {
    if req.samples.is_empty() {
        return Err(Failure::bad_request("Validation failed")
            .with_detail(json!({ "samples": "must contain at least one entry" })));
    }

    // One ownership check and one break lookup per distinct session.
    let mut by_session: BTreeMap<Uuid, Vec<NewSample>> = BTreeMap::new();
    for sample in req.samples {
        by_session.entry(sample.session_id).or_default().push(sample);
    }

    let mut normalized = Vec::new();
    for (session_id, mut samples) in by_session {
        let session = writable_session(&state, session_id, user_id).await?;
        let last_break = last_break_at(&state, &session).await?;
        for sample in &mut samples {
            normalize_sample(sample, last_break);
        }
        normalized.extend(samples);
    }

    let created = state
        .db
        .insert_samples(user_id, normalized)
        .await
        .map_err(|e| port_failure("record samples", e))?;
    Ok(success(StatusCode::CREATED, json!({ "created": created })))
}

/// Session-level aggregate metrics. Returns the cached snapshot once the
/// session has ended; recomputes from the raw samples while it is active.
#[utoipa::path(
    get,
    path = "/metrics/session/{id}/summary",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Final metrics snapshot"),
        (status = 404, description = "Unknown or unowned session")
    )
)]
pub async fn session_summary_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(session_id): Path<Uuid>,
) -> Result<Response, Failure> {
    let session = owned_session(&state, session_id, user_id).await?;

    if let Some(metrics) = &session.metrics {
        return Ok(success(StatusCode::OK, metrics));
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

    let metrics = calculate_final_metrics(&session, &samples, &interactions);
    Ok(success(StatusCode::OK, metrics))
}

/// Engagement trend bucketed into fixed-width windows.
#[utoipa::path(
    get,
    path = "/metrics/session/{id}/trend",
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ("interval" = Option<i64>, Query, description = "Bucket width in minutes (default 5)")
    ),
    responses(
        (status = 200, description = "Trend buckets ordered by start time"),
        (status = 400, description = "Invalid interval"),
        (status = 404, description = "Unknown or unowned session")
    )
)]
pub async fn session_trend_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<TrendQuery>,
) -> Result<Response, Failure> {
    let interval_minutes = query.interval.unwrap_or(DEFAULT_TREND_INTERVAL_MINUTES);
    if interval_minutes < 1 {
        return Err(Failure::bad_request("Validation failed")
            .with_detail(json!({ "interval": "must be a positive number of minutes" })));
    }

    owned_session(&state, session_id, user_id).await?;
    let samples = state
        .db
        .get_samples_for_session(session_id)
        .await
        .map_err(|e| port_failure("load samples", e))?;

    let buckets = engagement_trend(&samples, Duration::minutes(interval_minutes));
    Ok(success(StatusCode::OK, buckets))
}

/// Anomalies detected over the session's sample sequence.
#[utoipa::path(
    get,
    path = "/metrics/session/{id}/anomalies",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Detected anomalies in time order"),
        (status = 404, description = "Unknown or unowned session")
    )
)]
pub async fn session_anomalies_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(session_id): Path<Uuid>,
) -> Result<Response, Failure> {
    owned_session(&state, session_id, user_id).await?;
    let samples = state
        .db
        .get_samples_for_session(session_id)
        .await
        .map_err(|e| port_failure("load samples", e))?;

    let anomalies = detect_anomalies(&samples);
    Ok(success(StatusCode::OK, anomalies))
}
