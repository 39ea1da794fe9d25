//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::web::auth::session_cookie;
use crate::web::rest::Failure;
use crate::web::state::AppState;

/// The authenticated caller, inserted into request extensions by
/// [`require_auth`] for handlers to read.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uuid);

/// Middleware that validates the auth session cookie and resolves the caller.
///
/// If valid, inserts [`CurrentUser`] into request extensions. If invalid or
/// missing, responds 401 in the standard envelope without running the handler.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(auth_session_id) = session_cookie(req.headers()) else {
        return Failure::unauthorized("No session found").into_response();
    };

    let user_id = match state.db.validate_auth_session(&auth_session_id).await {
        Ok(user_id) => user_id,
        Err(e) => {
            debug!("Rejected auth session: {:?}", e);
            return Failure::unauthorized("Invalid or expired session").into_response();
        }
    };

    req.extensions_mut().insert(CurrentUser(user_id));
    next.run(req).await
}
