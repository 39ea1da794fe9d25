//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, and logout.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::rest::{port_failure, Failure};
use crate::web::state::AppState;

const SESSION_COOKIE: &str = "session";
const SESSION_LIFETIME_DAYS: i64 = 30;
const MIN_PASSWORD_LENGTH: usize = 8;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
}

//=========================================================================================
// Cookie Helpers
//=========================================================================================

/// Pulls the auth session id out of the request's cookie header, if present.
pub(crate) fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .map(str::to_string)
}

fn set_session_cookie(auth_session_id: &str) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        auth_session_id,
        Duration::days(SESSION_LIFETIME_DAYS).num_seconds()
    )
}

fn validate_credentials(email: &str, password: &str) -> Result<(), Failure> {
    let mut field_errors = serde_json::Map::new();
    if !email.contains('@') {
        field_errors.insert("email".into(), json!("must be a valid email address"));
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        field_errors.insert(
            "password".into(),
            json!(format!("must be at least {MIN_PASSWORD_LENGTH} characters")),
        );
    }
    if field_errors.is_empty() {
        Ok(())
    } else {
        Err(Failure::bad_request("Invalid signup request")
            .with_detail(serde_json::Value::Object(field_errors)))
    }
}

/// Opens a fresh auth session for the user and returns the cookie to set.
async fn open_auth_session(state: &Arc<AppState>, user_id: Uuid) -> Result<String, Failure> {
    let auth_session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(SESSION_LIFETIME_DAYS);
    state
        .db
        .create_auth_session(&auth_session_id, user_id, expires_at)
        .await
        .map_err(|e| port_failure("create auth session", e))?;
    Ok(set_session_cookie(&auth_session_id))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Invalid email or password"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<Response, Failure> {
    validate_credentials(&req.email, &req.password)?;

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            Failure::internal("Failed to create user")
        })?
        .to_string();

    let user = state
        .db
        .create_user_with_email(&req.email, &password_hash)
        .await
        .map_err(|e| port_failure("create user", e))?;

    let cookie = open_auth_session(&state, user.user_id).await?;

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(json!({
            "success": true,
            "data": AuthResponse {
                user_id: user.user_id,
                email: user.email.unwrap_or_default(),
            }
        })),
    )
        .into_response())
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, Failure> {
    // Unknown emails and bad passwords answer identically.
    let user_creds = state
        .db
        .get_user_by_email(&req.email)
        .await
        .map_err(|_| Failure::unauthorized("Invalid email or password"))?;

    let parsed_hash = PasswordHash::new(&user_creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        Failure::internal("Authentication error")
    })?;

    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();
    if !valid {
        return Err(Failure::unauthorized("Invalid email or password"));
    }

    let cookie = open_auth_session(&state, user_creds.user_id).await?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(json!({
            "success": true,
            "data": AuthResponse {
                user_id: user_creds.user_id,
                email: user_creds.email,
            }
        })),
    )
        .into_response())
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, Failure> {
    let auth_session_id =
        session_cookie(&headers).ok_or_else(|| Failure::unauthorized("No session found"))?;

    state
        .db
        .delete_auth_session(&auth_session_id)
        .await
        .map_err(|e| port_failure("delete auth session", e))?;

    let expired_cookie = format!(
        "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE
    );
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, expired_cookie)],
        Json(json!({ "success": true, "data": { "message": "Logged out" } })),
    )
        .into_response())
}
