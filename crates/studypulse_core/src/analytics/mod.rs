//! crates/studypulse_core/src/analytics/mod.rs
//!
//! Statistical reductions over recorded study data. Every function in this
//! module is pure: it takes slices of domain records and returns derived
//! values, so the arithmetic can be exercised without a database.

pub mod aggregate;
pub mod anomaly;
pub mod productivity;
pub mod trend;

pub use aggregate::{blink_compliance_score, calculate_final_metrics, count_rising_edges};
pub use anomaly::{detect_anomalies, Anomaly, AnomalyKind, Severity};
pub use productivity::{
    average_engagement, cross_session_overview, day_streak, letter_grade, productivity_score,
    Grade, OverviewStats, ProductivityComponents, ProductivityInputs, ProductivityScore,
};
pub use trend::{engagement_trend, TrendBucket, DEFAULT_TREND_INTERVAL_MINUTES};

#[cfg(test)]
pub(crate) mod testutil {
    use crate::domain::*;
    use chrono::{DateTime, TimeZone, Utc};
    use uuid::Uuid;

    /// Baseline timestamp shared by the analytics tests.
    pub fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
    }

    /// A present, focused, healthy observation captured at `at`.
    pub fn sample(session_id: Uuid, at: DateTime<Utc>) -> Sample {
        Sample {
            id: Uuid::new_v4(),
            session_id,
            user_id: Uuid::new_v4(),
            captured_at: at,
            presence: Presence {
                detected: true,
                confidence: 0.95,
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

    /// Flags the sample as a phone distraction.
    pub fn with_phone(mut s: Sample) -> Sample {
        s.distraction.detected = true;
        s.distraction.kind = DistractionKind::Phone;
        s
    }
}
