//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use studypulse_core::domain::{
    Distraction, Facial, FinalMetrics, Health, HeadPose, Interaction, InteractionKind,
    NewInteraction, NewSample, Posture, Presence, Sample, Session, User, UserCredentials,
};
use studypulse_core::ports::{DatabaseService, PortError, PortResult};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn parse_err(e: studypulse_core::domain::EnumParseError) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: Option<String>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    user_id: Uuid,
    subject: Option<String>,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    is_active: bool,
    duration_seconds: i64,
    metrics: Option<Json<FinalMetrics>>,
    summary: Option<String>,
}
impl SessionRecord {
    fn to_domain(self) -> Session {
        Session {
            id: self.id,
            user_id: self.user_id,
            subject: self.subject,
            started_at: self.started_at,
            ended_at: self.ended_at,
            is_active: self.is_active,
            duration_seconds: self.duration_seconds,
            metrics: self.metrics.map(|m| m.0),
            summary: self.summary,
        }
    }
}

const SESSION_COLUMNS: &str = "id, user_id, subject, started_at, ended_at, is_active, \
     duration_seconds, metrics, summary";

#[derive(FromRow)]
struct SampleRecord {
    id: Uuid,
    session_id: Uuid,
    user_id: Uuid,
    captured_at: DateTime<Utc>,
    presence_detected: bool,
    presence_confidence: f64,
    face_count: i32,
    blink_rate: f64,
    looking_at_screen: bool,
    emotion: String,
    eye_aspect_ratio: Option<f64>,
    gaze_direction: Option<String>,
    head_pose_pitch: Option<f64>,
    head_pose_yaw: Option<f64>,
    head_pose_roll: Option<f64>,
    posture_score: Option<f64>,
    posture_quality: String,
    slouching: bool,
    distraction_detected: bool,
    distraction_kind: String,
    attention_score: f64,
    eye_strain_risk: String,
    fatigue_level: f64,
    break_recommended: bool,
    engagement_score: f64,
}
impl SampleRecord {
    fn to_domain(self) -> PortResult<Sample> {
        let head_pose = match (self.head_pose_pitch, self.head_pose_yaw, self.head_pose_roll) {
            (Some(pitch), Some(yaw), Some(roll)) => Some(HeadPose { pitch, yaw, roll }),
            _ => None,
        };
        Ok(Sample {
            id: self.id,
            session_id: self.session_id,
            user_id: self.user_id,
            captured_at: self.captured_at,
            presence: Presence {
                detected: self.presence_detected,
                confidence: self.presence_confidence,
                face_count: self.face_count.max(0) as u32,
            },
            facial: Facial {
                blink_rate: self.blink_rate,
                looking_at_screen: self.looking_at_screen,
                emotion: self.emotion.parse().map_err(parse_err)?,
                eye_aspect_ratio: self.eye_aspect_ratio,
                gaze_direction: self.gaze_direction,
                head_pose,
            },
            posture: Posture {
                score: self.posture_score,
                quality: self.posture_quality.parse().map_err(parse_err)?,
                slouching: self.slouching,
            },
            distraction: Distraction {
                detected: self.distraction_detected,
                kind: self.distraction_kind.parse().map_err(parse_err)?,
                attention_score: self.attention_score,
            },
            health: Health {
                eye_strain_risk: self.eye_strain_risk.parse().map_err(parse_err)?,
                fatigue_level: self.fatigue_level,
                break_recommended: self.break_recommended,
            },
            engagement_score: self.engagement_score,
        })
    }
}

const SAMPLE_COLUMNS: &str = "id, session_id, user_id, captured_at, presence_detected, \
     presence_confidence, face_count, blink_rate, looking_at_screen, emotion, \
     eye_aspect_ratio, gaze_direction, head_pose_pitch, head_pose_yaw, head_pose_roll, \
     posture_score, posture_quality, slouching, distraction_detected, distraction_kind, \
     attention_score, eye_strain_risk, fatigue_level, break_recommended, engagement_score";

#[derive(FromRow)]
struct InteractionRecord {
    id: Uuid,
    session_id: Uuid,
    user_id: Uuid,
    kind: String,
    occurred_at: DateTime<Utc>,
    page: Option<i32>,
    duration_seconds: Option<f64>,
    detail: Option<String>,
}
impl InteractionRecord {
    fn to_domain(self) -> PortResult<Interaction> {
        Ok(Interaction {
            id: self.id,
            session_id: self.session_id,
            user_id: self.user_id,
            kind: self.kind.parse().map_err(parse_err)?,
            occurred_at: self.occurred_at,
            page: self.page,
            duration_seconds: self.duration_seconds,
            detail: self.detail,
        })
    }
}

/// Inserts one sample row inside the given executor. Shared by the single
/// and batch paths so both write identical rows.
async fn insert_sample_row<'e, E>(executor: E, user_id: Uuid, sample: &NewSample) -> PortResult<Uuid>
where
    E: sqlx::PgExecutor<'e>,
{
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO samples (id, session_id, user_id, captured_at, presence_detected, \
         presence_confidence, face_count, blink_rate, looking_at_screen, emotion, \
         eye_aspect_ratio, gaze_direction, head_pose_pitch, head_pose_yaw, head_pose_roll, \
         posture_score, posture_quality, slouching, distraction_detected, distraction_kind, \
         attention_score, eye_strain_risk, fatigue_level, break_recommended, engagement_score) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
         $18, $19, $20, $21, $22, $23, $24, $25)",
    )
    .bind(id)
    .bind(sample.session_id)
    .bind(user_id)
    .bind(sample.captured_at)
    .bind(sample.presence.detected)
    .bind(sample.presence.confidence)
    .bind(sample.presence.face_count as i32)
    .bind(sample.facial.blink_rate)
    .bind(sample.facial.looking_at_screen)
    .bind(sample.facial.emotion.as_str())
    .bind(sample.facial.eye_aspect_ratio)
    .bind(sample.facial.gaze_direction.as_deref())
    .bind(sample.facial.head_pose.map(|p| p.pitch))
    .bind(sample.facial.head_pose.map(|p| p.yaw))
    .bind(sample.facial.head_pose.map(|p| p.roll))
    .bind(sample.posture.score)
    .bind(sample.posture.quality.as_str())
    .bind(sample.posture.slouching)
    .bind(sample.distraction.detected)
    .bind(sample.distraction.kind.as_str())
    .bind(sample.distraction.attention_score)
    .bind(sample.health.eye_strain_risk.as_str())
    .bind(sample.health.fatigue_level)
    .bind(sample.health.break_recommended)
    .bind(sample.engagement_score)
    .execute(executor)
    .await
    .map_err(unexpected)?;
    Ok(id)
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let record: UserRecord = sqlx::query_as(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3) \
             RETURNING user_id, email",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e.as_database_error().and_then(|d| d.code()) {
            Some(code) if code == "23505" => {
                PortError::Conflict(format!("email {} is already registered", email))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record: CredentialsRecord = sqlx::query_as(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        user_id.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn create_session(&self, user_id: Uuid, subject: Option<&str>) -> PortResult<Session> {
        let record: SessionRecord = sqlx::query_as(&format!(
            "INSERT INTO sessions (id, user_id, subject) VALUES ($1, $2, $3) \
             RETURNING {SESSION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(subject)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_session_by_id(&self, session_id: Uuid) -> PortResult<Session> {
        let record: SessionRecord =
            sqlx::query_as(&format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"))
                .bind(session_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| match e {
                    sqlx::Error::RowNotFound => {
                        PortError::NotFound(format!("Session {} not found", session_id))
                    }
                    _ => unexpected(e),
                })?;
        Ok(record.to_domain())
    }

    async fn get_sessions_by_user(&self, user_id: Uuid) -> PortResult<Vec<Session>> {
        let records: Vec<SessionRecord> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = $1 ORDER BY started_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_completed_sessions_in_range(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PortResult<Vec<Session>> {
        let records: Vec<SessionRecord> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions \
             WHERE user_id = $1 AND is_active = false \
             AND ended_at >= $2 AND ended_at < $3 \
             ORDER BY ended_at ASC"
        ))
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn end_session(
        &self,
        session_id: Uuid,
        ended_at: DateTime<Utc>,
        duration_seconds: i64,
    ) -> PortResult<bool> {
        // Compare-and-swap on is_active: concurrent end requests race here
        // and exactly one sees rows_affected == 1.
        let result = sqlx::query(
            "UPDATE sessions SET is_active = false, ended_at = $2, duration_seconds = $3 \
             WHERE id = $1 AND is_active = true",
        )
        .bind(session_id)
        .bind(ended_at)
        .bind(duration_seconds)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() == 1)
    }

    async fn store_final_metrics(
        &self,
        session_id: Uuid,
        metrics: &FinalMetrics,
    ) -> PortResult<()> {
        sqlx::query("UPDATE sessions SET metrics = $2 WHERE id = $1")
            .bind(session_id)
            .bind(Json(metrics))
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn store_session_summary(&self, session_id: Uuid, summary: &str) -> PortResult<()> {
        sqlx::query("UPDATE sessions SET summary = $2 WHERE id = $1")
            .bind(session_id)
            .bind(summary)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn insert_sample(&self, user_id: Uuid, sample: NewSample) -> PortResult<Sample> {
        let id = insert_sample_row(&self.pool, user_id, &sample).await?;
        let record: SampleRecord =
            sqlx::query_as(&format!("SELECT {SAMPLE_COLUMNS} FROM samples WHERE id = $1"))
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(unexpected)?;
        record.to_domain()
    }

    async fn insert_samples(&self, user_id: Uuid, samples: Vec<NewSample>) -> PortResult<u64> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let mut written = 0u64;
        for sample in &samples {
            insert_sample_row(&mut *tx, user_id, sample).await?;
            written += 1;
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(written)
    }

    async fn get_samples_for_session(&self, session_id: Uuid) -> PortResult<Vec<Sample>> {
        let records: Vec<SampleRecord> = sqlx::query_as(&format!(
            "SELECT {SAMPLE_COLUMNS} FROM samples WHERE session_id = $1 ORDER BY captured_at ASC"
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn get_samples_for_user_in_range(
        &self,
        user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PortResult<Vec<Sample>> {
        let records: Vec<SampleRecord> = sqlx::query_as(&format!(
            "SELECT {SAMPLE_COLUMNS} FROM samples \
             WHERE user_id = $1 AND captured_at >= $2 AND captured_at < $3 \
             ORDER BY captured_at ASC"
        ))
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn insert_interactions(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        interactions: Vec<NewInteraction>,
    ) -> PortResult<u64> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let mut written = 0u64;
        for interaction in &interactions {
            sqlx::query(
                "INSERT INTO interactions (id, session_id, user_id, kind, occurred_at, page, \
                 duration_seconds, detail) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(Uuid::new_v4())
            .bind(session_id)
            .bind(user_id)
            .bind(interaction.kind.as_str())
            .bind(interaction.occurred_at)
            .bind(interaction.page)
            .bind(interaction.duration_seconds)
            .bind(interaction.detail.as_deref())
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
            written += 1;
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(written)
    }

    async fn get_interactions_for_session(
        &self,
        session_id: Uuid,
    ) -> PortResult<Vec<Interaction>> {
        let records: Vec<InteractionRecord> = sqlx::query_as(
            "SELECT id, session_id, user_id, kind, occurred_at, page, duration_seconds, detail \
             FROM interactions WHERE session_id = $1 ORDER BY occurred_at ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn get_last_break_end(&self, session_id: Uuid) -> PortResult<Option<DateTime<Utc>>> {
        sqlx::query_scalar(
            "SELECT occurred_at FROM interactions \
             WHERE session_id = $1 AND kind = 'break_end' \
             ORDER BY occurred_at DESC LIMIT 1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)
    }

    async fn count_interactions_in_range(
        &self,
        user_id: Uuid,
        kinds: &[InteractionKind],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PortResult<u64> {
        let kind_names: Vec<String> = kinds.iter().map(|k| k.as_str().to_string()).collect();
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM interactions \
             WHERE user_id = $1 AND kind = ANY($2) \
             AND occurred_at >= $3 AND occurred_at < $4",
        )
        .bind(user_id)
        .bind(&kind_names)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(count.max(0) as u64)
    }
}
