//! services/api/src/web/analytics.rs
//!
//! Cross-session analytics endpoints: study totals with streaks, and the
//! weighted productivity score.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Response,
    Extension,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use studypulse_core::analytics::{
    average_engagement, cross_session_overview, productivity_score, ProductivityInputs,
};
use studypulse_core::domain::InteractionKind;

use crate::web::middleware::CurrentUser;
use crate::web::rest::{port_failure, success, Failure};
use crate::web::state::AppState;

/// Days of history consulted for streaks and the trailing-week view.
const RECENT_HISTORY_DAYS: i64 = 365;
const DEFAULT_PERIOD_DAYS: i64 = 30;

//=========================================================================================
// Analysis Window
//=========================================================================================

#[derive(Deserialize)]
pub struct WindowQuery {
    /// Relative window: the trailing N days.
    pub period: Option<i64>,
    /// Explicit window bounds; both must be given together.
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

struct Window {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Window {
    fn days(&self) -> f64 {
        (self.end - self.start).num_seconds() as f64 / 86_400.0
    }
}

fn resolve_window(query: &WindowQuery, now: DateTime<Utc>) -> Result<Window, Failure> {
    match (query.start, query.end) {
        (Some(start), Some(end)) => {
            if start >= end {
                return Err(Failure::bad_request("Validation failed")
                    .with_detail(json!({ "start": "must be earlier than end" })));
            }
            Ok(Window { start, end })
        }
        (None, None) => {
            let period = query.period.unwrap_or(DEFAULT_PERIOD_DAYS);
            if period < 1 {
                return Err(Failure::bad_request("Validation failed")
                    .with_detail(json!({ "period": "must be a positive number of days" })));
            }
            Ok(Window {
                start: now - Duration::days(period),
                end: now,
            })
        }
        _ => Err(Failure::bad_request("Validation failed")
            .with_detail(json!({ "start": "start and end must be supplied together" }))),
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Study totals over the requested window, plus the fixed trailing-week
/// hours and the day streak (both anchored to now, not the window).
#[utoipa::path(
    get,
    path = "/analytics/overview",
    params(
        ("period" = Option<i64>, Query, description = "Trailing window in days (default 30)"),
        ("start" = Option<String>, Query, description = "Explicit window start (RFC 3339)"),
        ("end" = Option<String>, Query, description = "Explicit window end (RFC 3339)")
    ),
    responses(
        (status = 200, description = "Aggregate study statistics"),
        (status = 400, description = "Invalid window"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn overview_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Query(query): Query<WindowQuery>,
) -> Result<Response, Failure> {
    let now = Utc::now();
    let window = resolve_window(&query, now)?;

    let window_sessions = state
        .db
        .get_completed_sessions_in_range(user_id, window.start, window.end)
        .await
        .map_err(|e| port_failure("load sessions", e))?;
    let recent_sessions = state
        .db
        .get_completed_sessions_in_range(user_id, now - Duration::days(RECENT_HISTORY_DAYS), now)
        .await
        .map_err(|e| port_failure("load recent sessions", e))?;

    let stats = cross_session_overview(&window_sessions, &recent_sessions, now);
    Ok(success(StatusCode::OK, stats))
}

/// The weighted productivity score over the requested window.
#[utoipa::path(
    get,
    path = "/analytics/productivity-score",
    params(
        ("period" = Option<i64>, Query, description = "Trailing window in days (default 30)"),
        ("start" = Option<String>, Query, description = "Explicit window start (RFC 3339)"),
        ("end" = Option<String>, Query, description = "Explicit window end (RFC 3339)")
    ),
    responses(
        (status = 200, description = "Overall score, grade, and component scores"),
        (status = 400, description = "Invalid window"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn productivity_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Query(query): Query<WindowQuery>,
) -> Result<Response, Failure> {
    let now = Utc::now();
    let window = resolve_window(&query, now)?;

    let sessions = state
        .db
        .get_completed_sessions_in_range(user_id, window.start, window.end)
        .await
        .map_err(|e| port_failure("load sessions", e))?;
    let samples = state
        .db
        .get_samples_for_user_in_range(user_id, window.start, window.end)
        .await
        .map_err(|e| port_failure("load samples", e))?;
    let activity_events = state
        .db
        .count_interactions_in_range(
            user_id,
            &[InteractionKind::Highlight, InteractionKind::Annotation],
            window.start,
            window.end,
        )
        .await
        .map_err(|e| port_failure("count activity", e))?;

    let total_minutes = sessions
        .iter()
        .map(|s| s.duration_seconds as f64)
        .sum::<f64>()
        / 60.0;
    let presence_samples = samples.iter().filter(|s| s.presence.detected).count() as u32;
    let distraction_samples = samples.iter().filter(|s| s.distraction.detected).count() as u32;

    let inputs = ProductivityInputs {
        window_days: window.days(),
        completed_sessions: sessions.len() as u32,
        total_minutes,
        avg_engagement: average_engagement(&sessions),
        presence_samples,
        distraction_samples,
        total_samples: samples.len() as u32,
        activity_events: activity_events as u32,
    };
    Ok(success(StatusCode::OK, productivity_score(&inputs)))
}
