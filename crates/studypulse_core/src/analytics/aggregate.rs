//! crates/studypulse_core/src/analytics/aggregate.rs
//!
//! End-of-session aggregation: reduces a session's webcam samples and
//! interaction log into a single [`FinalMetrics`] snapshot.

use std::collections::BTreeMap;

use crate::domain::{FinalMetrics, Interaction, InteractionKind, Sample, Session};

/// Healthy blink range in blinks per minute.
const BLINK_HEALTHY_MIN: f64 = 15.0;
const BLINK_HEALTHY_MAX: f64 = 25.0;
/// Distance from the healthy range at which compliance bottoms out at 0.
const BLINK_DECAY_SPAN: f64 = 50.0;

/// Component weights of the composite engagement score.
const WEIGHT_ATTENTION: f64 = 0.5;
const WEIGHT_POSTURE: f64 = 0.3;
const WEIGHT_BLINK: f64 = 0.2;

/// Scores how close the average blink rate sits to the healthy
/// [`BLINK_HEALTHY_MIN`]..=[`BLINK_HEALTHY_MAX`] band. 100 inside the band,
/// decaying linearly to 0 as the distance from the nearer bound grows to
/// [`BLINK_DECAY_SPAN`] BPM.
pub fn blink_compliance_score(blink_rate: f64) -> f64 {
    let distance = if blink_rate < BLINK_HEALTHY_MIN {
        BLINK_HEALTHY_MIN - blink_rate
    } else if blink_rate > BLINK_HEALTHY_MAX {
        blink_rate - BLINK_HEALTHY_MAX
    } else {
        return 100.0;
    };
    (100.0 * (1.0 - distance.min(BLINK_DECAY_SPAN) / BLINK_DECAY_SPAN)).max(0.0)
}

/// Counts false -> true transitions in a flag sequence. A contiguous run of
/// `true` counts once, so streaks become discrete episodes rather than
/// per-sample tallies.
pub fn count_rising_edges<I>(flags: I) -> u32
where
    I: IntoIterator<Item = bool>,
{
    let mut edges = 0;
    let mut previous = false;
    for flag in flags {
        if flag && !previous {
            edges += 1;
        }
        previous = flag;
    }
    edges
}

fn has_phone(sample: &Sample) -> bool {
    sample.distraction.detected
        && sample.distraction.kind == crate::domain::DistractionKind::Phone
}

/// Sums seconds spent per page from `page_turn`/`page_change` interactions.
/// An interaction without a duration still registers the page as visited.
pub fn page_time_analytics(interactions: &[Interaction]) -> BTreeMap<i32, f64> {
    let mut by_page = BTreeMap::new();
    for interaction in interactions {
        if !matches!(
            interaction.kind,
            InteractionKind::PageTurn | InteractionKind::PageChange
        ) {
            continue;
        }
        let Some(page) = interaction.page else {
            continue;
        };
        *by_page.entry(page).or_insert(0.0) += interaction.duration_seconds.unwrap_or(0.0);
    }
    by_page
}

/// Reduces a session's recorded data into its final metrics snapshot.
///
/// With zero webcam samples this short-circuits to the all-zero snapshot;
/// only `duration_seconds` is carried over from the session record. Samples
/// are re-sorted by capture time before the edge-sensitive reductions, since
/// client timestamps may arrive out of order.
pub fn calculate_final_metrics(
    session: &Session,
    samples: &[Sample],
    interactions: &[Interaction],
) -> FinalMetrics {
    if samples.is_empty() {
        return FinalMetrics {
            duration_seconds: session.duration_seconds,
            ..FinalMetrics::default()
        };
    }

    let mut ordered: Vec<&Sample> = samples.iter().collect();
    ordered.sort_by_key(|s| s.captured_at);

    let total = ordered.len() as f64;
    let focused = ordered
        .iter()
        .filter(|s| s.facial.looking_at_screen)
        .count() as f64;
    let attention_rate = (100.0 * focused / total).round();

    // Missing posture scores count as 0 and pull the average down. That is
    // the recording policy, not an accident.
    let avg_posture_score = ordered
        .iter()
        .map(|s| s.posture.score.unwrap_or(0.0))
        .sum::<f64>()
        / total;

    let avg_blink_rate = (ordered.iter().map(|s| s.facial.blink_rate).sum::<f64>() / total).round();
    let compliance = blink_compliance_score(avg_blink_rate);

    let engagement_score = (attention_rate * WEIGHT_ATTENTION
        + avg_posture_score * WEIGHT_POSTURE
        + compliance * WEIGHT_BLINK)
        .round()
        .clamp(0.0, 100.0);

    let distraction_count = count_rising_edges(ordered.iter().map(|s| has_phone(s)));

    let page_time = page_time_analytics(interactions);
    let total_highlights = interactions
        .iter()
        .filter(|i| i.kind == InteractionKind::Highlight)
        .count() as u32;

    FinalMetrics {
        engagement_score: engagement_score as u32,
        attention_rate: attention_rate as u32,
        avg_posture_score,
        avg_blink_rate: avg_blink_rate as u32,
        distraction_count,
        duration_seconds: session.duration_seconds,
        total_highlights,
        pages_visited: page_time.len() as u32,
        total_metrics_recorded: ordered.len() as u32,
        page_time_analytics: page_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::testutil::{sample, t0, with_phone};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn session(duration_seconds: i64) -> Session {
        Session {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            subject: None,
            started_at: t0(),
            ended_at: Some(t0() + Duration::seconds(duration_seconds)),
            is_active: false,
            duration_seconds,
            metrics: None,
            summary: None,
        }
    }

    fn highlight(session_id: Uuid, at: chrono::DateTime<Utc>) -> Interaction {
        Interaction {
            id: Uuid::new_v4(),
            session_id,
            user_id: Uuid::new_v4(),
            kind: InteractionKind::Highlight,
            occurred_at: at,
            page: None,
            duration_seconds: None,
            detail: None,
        }
    }

    fn page_turn(session_id: Uuid, page: i32, seconds: f64) -> Interaction {
        Interaction {
            id: Uuid::new_v4(),
            session_id,
            user_id: Uuid::new_v4(),
            kind: InteractionKind::PageTurn,
            occurred_at: t0(),
            page: Some(page),
            duration_seconds: Some(seconds),
            detail: None,
        }
    }

    #[test]
    fn no_samples_short_circuits_to_zero_snapshot() {
        let session = session(1800);
        let metrics = calculate_final_metrics(&session, &[], &[highlight(session.id, t0())]);

        assert_eq!(metrics.engagement_score, 0);
        assert_eq!(metrics.attention_rate, 0);
        assert_eq!(metrics.avg_blink_rate, 0);
        assert_eq!(metrics.distraction_count, 0);
        assert_eq!(metrics.total_metrics_recorded, 0);
        assert_eq!(metrics.total_highlights, 0);
        // Duration is still read from the session record.
        assert_eq!(metrics.duration_seconds, 1800);
    }

    #[test]
    fn blink_compliance_reference_points() {
        assert_eq!(blink_compliance_score(20.0), 100.0);
        assert_eq!(blink_compliance_score(15.0), 100.0);
        assert_eq!(blink_compliance_score(25.0), 100.0);
        // 15 BPM below the band: 100 * (1 - 15/50) = 70.
        assert!((blink_compliance_score(0.0) - 70.0).abs() < 1e-9);
        // 75 BPM above the band clamps to the full decay span.
        assert_eq!(blink_compliance_score(100.0), 0.0);
    }

    #[test]
    fn rising_edges_count_episodes_not_samples() {
        assert_eq!(
            count_rising_edges([false, true, true, false, true]),
            2
        );
        assert_eq!(count_rising_edges([true, true, true]), 1);
        assert_eq!(count_rising_edges([false, false]), 0);
        assert_eq!(count_rising_edges(std::iter::empty()), 0);
    }

    #[test]
    fn distraction_count_uses_time_order_not_arrival_order() {
        let session = session(600);
        let base = t0();
        // Arrival order interleaves two phone episodes; sorted by timestamp
        // the sequence is [none, phone, phone, none, phone] -> 2 edges.
        let samples = vec![
            with_phone(sample(session.id, base + Duration::seconds(40))),
            sample(session.id, base),
            with_phone(sample(session.id, base + Duration::seconds(20))),
            sample(session.id, base + Duration::seconds(30)),
            with_phone(sample(session.id, base + Duration::seconds(10))),
        ];

        let metrics = calculate_final_metrics(&session, &samples, &[]);
        assert_eq!(metrics.distraction_count, 2);
    }

    #[test]
    fn composite_score_blends_attention_posture_and_blink() {
        let session = session(600);
        let base = t0();
        let mut samples = vec![
            sample(session.id, base),
            sample(session.id, base + Duration::seconds(10)),
            sample(session.id, base + Duration::seconds(20)),
            sample(session.id, base + Duration::seconds(30)),
        ];
        samples[3].facial.looking_at_screen = false;

        let metrics = calculate_final_metrics(&session, &samples, &[]);

        // 3 of 4 focused -> 75; posture 80; blink 18 BPM -> compliance 100.
        assert_eq!(metrics.attention_rate, 75);
        assert_eq!(metrics.avg_posture_score, 80.0);
        assert_eq!(metrics.avg_blink_rate, 18);
        // round(75*0.5 + 80*0.3 + 100*0.2) = round(81.5) = 82
        assert_eq!(metrics.engagement_score, 82);
        assert!(metrics.engagement_score <= 100);
    }

    #[test]
    fn missing_posture_scores_drag_the_average_down() {
        let session = session(600);
        let base = t0();
        let mut samples = vec![
            sample(session.id, base),
            sample(session.id, base + Duration::seconds(10)),
        ];
        samples[1].posture.score = None;

        let metrics = calculate_final_metrics(&session, &samples, &[]);
        assert_eq!(metrics.avg_posture_score, 40.0);
    }

    #[test]
    fn interaction_counts_and_page_times() {
        let session = session(600);
        let interactions = vec![
            highlight(session.id, t0()),
            highlight(session.id, t0() + Duration::seconds(5)),
            page_turn(session.id, 1, 30.0),
            page_turn(session.id, 2, 45.0),
            page_turn(session.id, 1, 15.0),
        ];
        let samples = vec![sample(session.id, t0())];

        let metrics = calculate_final_metrics(&session, &samples, &interactions);
        assert_eq!(metrics.total_highlights, 2);
        assert_eq!(metrics.pages_visited, 2);
        assert_eq!(metrics.page_time_analytics.get(&1), Some(&45.0));
        assert_eq!(metrics.page_time_analytics.get(&2), Some(&45.0));
    }
}
