//! crates/studypulse_core/src/analytics/anomaly.rs
//!
//! Single-pass anomaly detection over a session's webcam samples: abrupt
//! engagement drops between adjacent samples, and prolonged absence runs.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::Sample;

/// Point drop between adjacent samples that registers as an anomaly.
pub const ENGAGEMENT_DROP_THRESHOLD: f64 = 30.0;
/// Point drop above which the anomaly is reported as high severity.
pub const SEVERE_DROP_THRESHOLD: f64 = 50.0;
/// Consecutive absent samples that make up a prolonged-absence episode.
pub const ABSENCE_RUN_LENGTH: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    EngagementDrop,
    ProlongedAbsence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize)]
pub struct Anomaly {
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub details: String,
}

/// Walks the samples once in time order.
///
/// An engagement drop fires on each adjacent pair falling more than
/// [`ENGAGEMENT_DROP_THRESHOLD`] points. A prolonged absence fires exactly
/// once per contiguous run of absent samples, the instant the run reaches
/// [`ABSENCE_RUN_LENGTH`]; the run counter only resets when presence
/// resumes, so longer runs do not emit again.
pub fn detect_anomalies(samples: &[Sample]) -> Vec<Anomaly> {
    let mut ordered: Vec<&Sample> = samples.iter().collect();
    ordered.sort_by_key(|s| s.captured_at);

    let mut anomalies = Vec::new();
    let mut absence_run = 0u32;

    for (i, sample) in ordered.iter().enumerate() {
        if i > 0 {
            let drop = ordered[i - 1].engagement_score - sample.engagement_score;
            if drop > ENGAGEMENT_DROP_THRESHOLD {
                let severity = if drop > SEVERE_DROP_THRESHOLD {
                    Severity::High
                } else {
                    Severity::Medium
                };
                anomalies.push(Anomaly {
                    kind: AnomalyKind::EngagementDrop,
                    timestamp: sample.captured_at,
                    severity,
                    details: format!("engagement fell {drop:.0} points between consecutive samples"),
                });
            }
        }

        if sample.presence.detected {
            absence_run = 0;
        } else {
            absence_run += 1;
            if absence_run == ABSENCE_RUN_LENGTH {
                anomalies.push(Anomaly {
                    kind: AnomalyKind::ProlongedAbsence,
                    timestamp: sample.captured_at,
                    severity: Severity::High,
                    details: format!(
                        "no face detected for {ABSENCE_RUN_LENGTH} consecutive samples"
                    ),
                });
            }
        }
    }

    anomalies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::testutil::{sample, t0};
    use chrono::Duration;
    use uuid::Uuid;

    fn scored(session_id: Uuid, offset_secs: i64, engagement: f64) -> Sample {
        let mut s = sample(session_id, t0() + Duration::seconds(offset_secs));
        s.engagement_score = engagement;
        s
    }

    fn absent(session_id: Uuid, offset_secs: i64) -> Sample {
        let mut s = sample(session_id, t0() + Duration::seconds(offset_secs));
        s.presence.detected = false;
        s
    }

    #[test]
    fn drop_of_forty_is_medium_severity() {
        let id = Uuid::new_v4();
        let samples = vec![scored(id, 0, 80.0), scored(id, 10, 40.0)];
        let anomalies = detect_anomalies(&samples);

        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::EngagementDrop);
        assert_eq!(anomalies[0].severity, Severity::Medium);
        assert_eq!(anomalies[0].timestamp, t0() + Duration::seconds(10));
    }

    #[test]
    fn drop_of_seventy_is_high_severity() {
        let id = Uuid::new_v4();
        let samples = vec![scored(id, 0, 90.0), scored(id, 10, 20.0)];
        let anomalies = detect_anomalies(&samples);

        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].severity, Severity::High);
    }

    #[test]
    fn drop_of_exactly_thirty_does_not_fire() {
        let id = Uuid::new_v4();
        let samples = vec![scored(id, 0, 80.0), scored(id, 10, 50.0)];
        assert!(detect_anomalies(&samples).is_empty());
    }

    #[test]
    fn drops_are_evaluated_in_time_order() {
        let id = Uuid::new_v4();
        // Submitted out of order; sorted the sequence is 90 -> 85 -> 30,
        // a single high-severity drop on the last pair.
        let samples = vec![scored(id, 20, 30.0), scored(id, 0, 90.0), scored(id, 10, 85.0)];
        let anomalies = detect_anomalies(&samples);

        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].severity, Severity::High);
        assert_eq!(anomalies[0].timestamp, t0() + Duration::seconds(20));
    }

    #[test]
    fn prolonged_absence_fires_once_at_the_fifth_sample() {
        let id = Uuid::new_v4();
        let samples: Vec<Sample> = (0..8).map(|i| absent(id, i * 10)).collect();
        let anomalies = detect_anomalies(&samples);

        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::ProlongedAbsence);
        assert_eq!(anomalies[0].severity, Severity::High);
        // Fifth consecutive miss sits at offset 40s.
        assert_eq!(anomalies[0].timestamp, t0() + Duration::seconds(40));
    }

    #[test]
    fn four_absent_samples_are_not_an_episode() {
        let id = Uuid::new_v4();
        let samples: Vec<Sample> = (0..4).map(|i| absent(id, i * 10)).collect();
        assert!(detect_anomalies(&samples).is_empty());
    }

    #[test]
    fn presence_resets_the_run_and_allows_a_second_episode() {
        let id = Uuid::new_v4();
        let mut samples: Vec<Sample> = (0..5).map(|i| absent(id, i * 10)).collect();
        samples.push(sample(id, t0() + Duration::seconds(50)));
        samples.extend((6..11).map(|i| absent(id, i * 10)));

        let anomalies = detect_anomalies(&samples);
        let absences: Vec<_> = anomalies
            .iter()
            .filter(|a| a.kind == AnomalyKind::ProlongedAbsence)
            .collect();
        assert_eq!(absences.len(), 2);
    }
}
