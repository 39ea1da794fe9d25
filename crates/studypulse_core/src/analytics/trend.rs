//! crates/studypulse_core/src/analytics/trend.rs
//!
//! Time-bucketed engagement trend over a session's webcam samples.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::Sample;

/// Bucket width used when the caller does not ask for one.
pub const DEFAULT_TREND_INTERVAL_MINUTES: i64 = 5;

/// Aggregate for one fixed-width time window, keyed by its start instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendBucket {
    pub timestamp: DateTime<Utc>,
    pub avg_engagement: f64,
    pub avg_attention: f64,
    pub distraction_count: u32,
    pub datapoints: u32,
}

#[derive(Default)]
struct BucketAccumulator {
    engagement_sum: f64,
    attention_sum: f64,
    distraction_count: u32,
    datapoints: u32,
}

/// Buckets samples into fixed-width windows aligned to epoch boundaries
/// (`bucket = ts - ts mod interval`) and averages engagement and attention
/// within each. Buckets come back ordered by start time ascending; windows
/// with no samples are simply absent.
pub fn engagement_trend(samples: &[Sample], interval: Duration) -> Vec<TrendBucket> {
    let interval_ms = interval.num_milliseconds();
    if interval_ms <= 0 {
        return Vec::new();
    }

    let mut buckets: BTreeMap<i64, BucketAccumulator> = BTreeMap::new();
    for sample in samples {
        let ts_ms = sample.captured_at.timestamp_millis();
        let key = ts_ms - ts_ms.rem_euclid(interval_ms);
        let bucket = buckets.entry(key).or_default();
        bucket.engagement_sum += sample.engagement_score;
        bucket.attention_sum += sample.distraction.attention_score;
        if sample.distraction.detected {
            bucket.distraction_count += 1;
        }
        bucket.datapoints += 1;
    }

    buckets
        .into_iter()
        .map(|(key, acc)| {
            let n = acc.datapoints as f64;
            TrendBucket {
                // Keys are truncated sample timestamps, so they stay within
                // the representable range.
                timestamp: DateTime::from_timestamp_millis(key)
                    .expect("bucket key derived from a valid timestamp"),
                avg_engagement: acc.engagement_sum / n,
                avg_attention: acc.attention_sum / n,
                distraction_count: acc.distraction_count,
                datapoints: acc.datapoints,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::testutil::{sample, t0, with_phone};
    use uuid::Uuid;

    #[test]
    fn samples_in_the_same_window_average_together() {
        let session_id = Uuid::new_v4();
        let mut first = sample(session_id, t0());
        first.engagement_score = 80.0;
        let mut second = sample(session_id, t0() + Duration::minutes(2));
        second.engagement_score = 60.0;

        let buckets = engagement_trend(&[first, second], Duration::minutes(5));
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].avg_engagement, 70.0);
        assert_eq!(buckets[0].datapoints, 2);
    }

    #[test]
    fn samples_straddling_a_boundary_split_into_two_buckets() {
        let session_id = Uuid::new_v4();
        // t0 is 09:00:00, so 09:04:59 and 09:05:00 sit on opposite sides of
        // an epoch-aligned 5-minute boundary.
        let before = sample(session_id, t0() + Duration::seconds(299));
        let after = sample(session_id, t0() + Duration::seconds(300));

        let buckets = engagement_trend(&[before, after], Duration::minutes(5));
        assert_eq!(buckets.len(), 2);
        assert!(buckets[0].timestamp < buckets[1].timestamp);
        assert_eq!(buckets[0].datapoints, 1);
        assert_eq!(buckets[1].datapoints, 1);
    }

    #[test]
    fn buckets_are_epoch_aligned_and_ascending() {
        let session_id = Uuid::new_v4();
        let samples = vec![
            sample(session_id, t0() + Duration::minutes(11)),
            sample(session_id, t0()),
            sample(session_id, t0() + Duration::minutes(6)),
        ];

        let buckets = engagement_trend(&samples, Duration::minutes(5));
        assert_eq!(buckets.len(), 3);
        for bucket in &buckets {
            assert_eq!(bucket.timestamp.timestamp_millis() % (5 * 60 * 1000), 0);
        }
        assert!(buckets.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn distraction_samples_are_counted_per_bucket() {
        let session_id = Uuid::new_v4();
        let samples = vec![
            with_phone(sample(session_id, t0())),
            with_phone(sample(session_id, t0() + Duration::minutes(1))),
            sample(session_id, t0() + Duration::minutes(2)),
        ];

        let buckets = engagement_trend(&samples, Duration::minutes(5));
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].distraction_count, 2);
        assert_eq!(buckets[0].datapoints, 3);
    }

    #[test]
    fn zero_interval_yields_no_buckets() {
        let session_id = Uuid::new_v4();
        let samples = vec![sample(session_id, t0())];
        assert!(engagement_trend(&samples, Duration::zero()).is_empty());
    }
}
