//! crates/studypulse_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    FinalMetrics, Interaction, NewInteraction, NewSample, Sample, Session, User, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Conflicting state: {0}")]
    Conflict(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth Methods ---
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Study Session Management ---
    async fn create_session(&self, user_id: Uuid, subject: Option<&str>) -> PortResult<Session>;

    async fn get_session_by_id(&self, session_id: Uuid) -> PortResult<Session>;

    async fn get_sessions_by_user(&self, user_id: Uuid) -> PortResult<Vec<Session>>;

    /// Completed sessions whose end time falls inside `[start, end)`.
    async fn get_completed_sessions_in_range(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PortResult<Vec<Session>>;

    /// Atomically flips `is_active` off for the session. Returns `true` for
    /// the request that won the transition; `false` if the session had
    /// already ended. Only the winner may write the metrics snapshot.
    async fn end_session(
        &self,
        session_id: Uuid,
        ended_at: DateTime<Utc>,
        duration_seconds: i64,
    ) -> PortResult<bool>;

    async fn store_final_metrics(
        &self,
        session_id: Uuid,
        metrics: &FinalMetrics,
    ) -> PortResult<()>;

    async fn store_session_summary(&self, session_id: Uuid, summary: &str) -> PortResult<()>;

    // --- Webcam Samples ---
    async fn insert_sample(&self, user_id: Uuid, sample: NewSample) -> PortResult<Sample>;

    /// Appends a batch in a single transaction; nothing is persisted when
    /// any row fails. Returns the number of rows written.
    async fn insert_samples(&self, user_id: Uuid, samples: Vec<NewSample>) -> PortResult<u64>;

    async fn get_samples_for_session(&self, session_id: Uuid) -> PortResult<Vec<Sample>>;

    async fn get_samples_for_user_in_range(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PortResult<Vec<Sample>>;

    // --- Interactions ---
    async fn insert_interactions(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        interactions: Vec<NewInteraction>,
    ) -> PortResult<u64>;

    async fn get_interactions_for_session(&self, session_id: Uuid) -> PortResult<Vec<Interaction>>;

    /// Timestamp of the most recent `break_end` interaction, if any.
    async fn get_last_break_end(&self, session_id: Uuid) -> PortResult<Option<DateTime<Utc>>>;

    /// Interactions of the given kinds recorded for the user in `[start, end)`.
    async fn count_interactions_in_range(
        &self,
        user_id: Uuid,
        kinds: &[crate::domain::InteractionKind],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PortResult<u64>;
}

#[async_trait]
pub trait SummaryGenerationService: Send + Sync {
    /// Generates a short natural-language recap of a finished session from
    /// its metrics snapshot.
    async fn summarize_session(
        &self,
        session: &Session,
        metrics: &FinalMetrics,
    ) -> PortResult<String>;
}
