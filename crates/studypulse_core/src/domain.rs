//! crates/studypulse_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs carry no storage or transport behavior; everything that
//! operates on them lives in free functions (see the `analytics` module)
//! or behind the service ports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Fatigue level above which a break is always recommended.
pub const FATIGUE_BREAK_THRESHOLD: f64 = 75.0;
/// Minutes of uninterrupted study after which a break is always recommended.
pub const BREAK_INTERVAL_MINUTES: f64 = 25.0;

//=========================================================================================
// Enumerations
//=========================================================================================

/// Error returned when a stored string does not map onto one of the
/// domain enumerations below.
#[derive(Debug, thiserror::Error)]
#[error("unrecognized {kind} value: {value}")]
pub struct EnumParseError {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = EnumParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(EnumParseError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum!(Emotion, "emotion", {
    Neutral => "neutral",
    Happy => "happy",
    Sad => "sad",
    Angry => "angry",
    Fearful => "fearful",
    Disgusted => "disgusted",
    Surprised => "surprised",
});

string_enum!(PostureQuality, "posture quality", {
    Good => "good",
    Fair => "fair",
    Poor => "poor",
});

string_enum!(DistractionKind, "distraction kind", {
    Phone => "phone",
    LookingAway => "looking_away",
    MultiplePeople => "multiple_people",
    Absence => "absence",
    Other => "other",
    None => "none",
});

string_enum!(EyeStrainRisk, "eye strain risk", {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

string_enum!(InteractionKind, "interaction kind", {
    Highlight => "highlight",
    Annotation => "annotation",
    PageTurn => "page_turn",
    PageChange => "page_change",
    Webcam => "webcam",
    BreakStart => "break_start",
    BreakEnd => "break_end",
    Other => "other",
});

//=========================================================================================
// Webcam samples
//=========================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Presence {
    pub detected: bool,
    pub confidence: f64,
    pub face_count: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HeadPose {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Facial {
    pub blink_rate: f64,
    pub looking_at_screen: bool,
    pub emotion: Emotion,
    #[serde(default)]
    pub eye_aspect_ratio: Option<f64>,
    #[serde(default)]
    pub gaze_direction: Option<String>,
    #[serde(default)]
    pub head_pose: Option<HeadPose>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Posture {
    /// Absent when the estimator could not score the frame. Aggregation
    /// counts a missing score as 0.
    #[serde(default)]
    pub score: Option<f64>,
    pub quality: PostureQuality,
    pub slouching: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Distraction {
    pub detected: bool,
    pub kind: DistractionKind,
    pub attention_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub eye_strain_risk: EyeStrainRisk,
    pub fatigue_level: f64,
    pub break_recommended: bool,
}

/// One webcam-derived observation as submitted by a client, before it has
/// been persisted. Timestamps are caller-supplied, so out-of-order arrival
/// is possible and readers must sort before aggregating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSample {
    pub session_id: Uuid,
    pub captured_at: DateTime<Utc>,
    pub presence: Presence,
    pub facial: Facial,
    pub posture: Posture,
    pub distraction: Distraction,
    pub health: Health,
    pub engagement_score: f64,
}

/// A persisted observation. Immutable once written.
#[derive(Debug, Clone, Serialize)]
pub struct Sample {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub captured_at: DateTime<Utc>,
    pub presence: Presence,
    pub facial: Facial,
    pub posture: Posture,
    pub distraction: Distraction,
    pub health: Health,
    pub engagement_score: f64,
}

/// Clamps the bounded fields of an incoming observation and applies the
/// break policy: a break is recommended once fatigue exceeds
/// [`FATIGUE_BREAK_THRESHOLD`], eye strain turns critical, or more than
/// [`BREAK_INTERVAL_MINUTES`] have passed since the last break.
pub fn normalize_sample(sample: &mut NewSample, last_break_at: DateTime<Utc>) {
    sample.presence.confidence = sample.presence.confidence.clamp(0.0, 1.0);
    sample.facial.blink_rate = sample.facial.blink_rate.max(0.0);
    if let Some(score) = sample.posture.score.as_mut() {
        *score = score.clamp(0.0, 100.0);
    }
    sample.distraction.attention_score = sample.distraction.attention_score.clamp(0.0, 100.0);
    sample.health.fatigue_level = sample.health.fatigue_level.clamp(0.0, 100.0);
    sample.engagement_score = sample.engagement_score.clamp(0.0, 100.0);

    let minutes_since_break = (sample.captured_at - last_break_at).num_seconds() as f64 / 60.0;
    if sample.health.fatigue_level > FATIGUE_BREAK_THRESHOLD
        || sample.health.eye_strain_risk == EyeStrainRisk::Critical
        || minutes_since_break > BREAK_INTERVAL_MINUTES
    {
        sample.health.break_recommended = true;
    }
}

//=========================================================================================
// Study sessions
//=========================================================================================

/// One continuous study period for one student. A session transitions
/// active -> ended exactly once; `metrics` is written at that transition
/// and is read-only afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subject: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub duration_seconds: i64,
    pub metrics: Option<FinalMetrics>,
    pub summary: Option<String>,
}

/// A non-webcam event recorded against a session (highlight, page turn,
/// break, ...). Append-only, ordered by `occurred_at`.
#[derive(Debug, Clone, Serialize)]
pub struct Interaction {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub kind: InteractionKind,
    pub occurred_at: DateTime<Utc>,
    pub page: Option<i32>,
    pub duration_seconds: Option<f64>,
    pub detail: Option<String>,
}

/// An interaction as submitted by a client.
#[derive(Debug, Clone, Deserialize)]
pub struct NewInteraction {
    pub kind: InteractionKind,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub page: Option<i32>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// The cached end-of-session snapshot. Computed once when a session ends,
/// or on the fly for a still-active session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalMetrics {
    pub engagement_score: u32,
    pub attention_rate: u32,
    pub avg_posture_score: f64,
    pub avg_blink_rate: u32,
    pub distraction_count: u32,
    pub duration_seconds: i64,
    pub total_highlights: u32,
    pub pages_visited: u32,
    pub total_metrics_recorded: u32,
    /// Seconds spent per page, keyed by page number.
    pub page_time_analytics: BTreeMap<i32, f64>,
}

//=========================================================================================
// Users and auth
//=========================================================================================

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_at(captured_at: DateTime<Utc>) -> NewSample {
        NewSample {
            session_id: Uuid::new_v4(),
            captured_at,
            presence: Presence {
                detected: true,
                confidence: 0.9,
                face_count: 1,
            },
            facial: Facial {
                blink_rate: 18.0,
                looking_at_screen: true,
                emotion: Emotion::Neutral,
                eye_aspect_ratio: None,
                gaze_direction: None,
                head_pose: None,
            },
            posture: Posture {
                score: Some(80.0),
                quality: PostureQuality::Good,
                slouching: false,
            },
            distraction: Distraction {
                detected: false,
                kind: DistractionKind::None,
                attention_score: 90.0,
            },
            health: Health {
                eye_strain_risk: EyeStrainRisk::Low,
                fatigue_level: 20.0,
                break_recommended: false,
            },
            engagement_score: 85.0,
        }
    }

    #[test]
    fn normalize_clamps_engagement_score() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let mut sample = sample_at(now);
        sample.engagement_score = 140.0;
        normalize_sample(&mut sample, now);
        assert_eq!(sample.engagement_score, 100.0);

        let mut sample = sample_at(now);
        sample.engagement_score = -3.0;
        normalize_sample(&mut sample, now);
        assert_eq!(sample.engagement_score, 0.0);
    }

    #[test]
    fn break_recommended_on_high_fatigue() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let mut sample = sample_at(now);
        sample.health.fatigue_level = 76.0;
        normalize_sample(&mut sample, now);
        assert!(sample.health.break_recommended);
    }

    #[test]
    fn break_recommended_on_critical_eye_strain() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let mut sample = sample_at(now);
        sample.health.eye_strain_risk = EyeStrainRisk::Critical;
        normalize_sample(&mut sample, now);
        assert!(sample.health.break_recommended);
    }

    #[test]
    fn break_recommended_after_long_stretch_without_break() {
        let last_break = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let captured = last_break + chrono::Duration::minutes(26);
        let mut sample = sample_at(captured);
        normalize_sample(&mut sample, last_break);
        assert!(sample.health.break_recommended);

        let captured = last_break + chrono::Duration::minutes(10);
        let mut sample = sample_at(captured);
        normalize_sample(&mut sample, last_break);
        assert!(!sample.health.break_recommended);
    }

    #[test]
    fn interaction_kind_round_trips_through_strings() {
        for kind in [
            InteractionKind::Highlight,
            InteractionKind::PageTurn,
            InteractionKind::BreakEnd,
        ] {
            let parsed: InteractionKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
        assert!("page-flip".parse::<InteractionKind>().is_err());
    }
}
