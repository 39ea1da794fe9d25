//! crates/studypulse_core/src/analytics/productivity.rs
//!
//! Cross-session analytics: study totals, day streaks, and the weighted
//! productivity score with its letter grade.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::domain::Session;

/// Daily targets the sub-scores are normalized against.
const TARGET_SESSIONS_PER_DAY: f64 = 1.0;
const TARGET_MINUTES_PER_DAY: f64 = 240.0;
const TARGET_ACTIVITY_PER_DAY: f64 = 20.0;

/// Fixed blend weights: frequency, time-on-task, engagement, presence,
/// focus, activity.
const WEIGHT_FREQUENCY: f64 = 0.15;
const WEIGHT_TIME_ON_TASK: f64 = 0.20;
const WEIGHT_ENGAGEMENT: f64 = 0.25;
const WEIGHT_PRESENCE: f64 = 0.15;
const WEIGHT_FOCUS: f64 = 0.15;
const WEIGHT_ACTIVITY: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "D")]
    D,
}

/// Maps a [0,100] score onto its letter grade.
pub fn letter_grade(score: f64) -> Grade {
    if score >= 90.0 {
        Grade::APlus
    } else if score >= 85.0 {
        Grade::A
    } else if score >= 80.0 {
        Grade::AMinus
    } else if score >= 70.0 {
        Grade::B
    } else if score >= 60.0 {
        Grade::C
    } else {
        Grade::D
    }
}

//=========================================================================================
// Overview statistics
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewStats {
    pub total_hours: f64,
    pub week_hours: f64,
    pub avg_engagement: f64,
    pub completed_sessions: u32,
    pub day_streak: u32,
}

/// Calendar days (UTC, day granularity) on which at least one of the given
/// sessions completed.
pub fn active_study_days(sessions: &[Session]) -> BTreeSet<NaiveDate> {
    sessions
        .iter()
        .filter_map(|s| s.ended_at)
        .map(|ended| ended.date_naive())
        .collect()
}

fn total_hours(sessions: &[Session]) -> f64 {
    sessions.iter().map(|s| s.duration_seconds as f64).sum::<f64>() / 3600.0
}

/// Mean cached engagement score over sessions that carry a metrics
/// snapshot; 0 when none do.
pub fn average_engagement(sessions: &[Session]) -> f64 {
    let scores: Vec<f64> = sessions
        .iter()
        .filter_map(|s| s.metrics.as_ref())
        .map(|m| m.engagement_score as f64)
        .collect();
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().sum::<f64>() / scores.len() as f64
}

/// Counts consecutive active days walking backward from `today`. A streak
/// may start today or yesterday; an older most-recent active day means the
/// streak is already broken and the count is 0 regardless of history.
pub fn day_streak(active_days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let start = if active_days.contains(&today) {
        today
    } else {
        let yesterday = today - Duration::days(1);
        if active_days.contains(&yesterday) {
            yesterday
        } else {
            return 0;
        }
    };

    let mut streak = 0;
    let mut day = start;
    while active_days.contains(&day) {
        streak += 1;
        day = day - Duration::days(1);
    }
    streak
}

/// Aggregates the requested window alongside the fixed trailing-week view.
///
/// `window_sessions` are the completed sessions inside the caller's period;
/// `recent_sessions` is a wider recent slice (up to a year) used for the
/// trailing-7-day hours and the streak, both of which are anchored to `now`
/// rather than to the requested window.
pub fn cross_session_overview(
    window_sessions: &[Session],
    recent_sessions: &[Session],
    now: DateTime<Utc>,
) -> OverviewStats {
    let week_start = now - Duration::days(7);
    let week_sessions: Vec<Session> = recent_sessions
        .iter()
        .filter(|s| s.ended_at.is_some_and(|ended| ended >= week_start))
        .cloned()
        .collect();

    OverviewStats {
        total_hours: total_hours(window_sessions),
        week_hours: total_hours(&week_sessions),
        avg_engagement: average_engagement(window_sessions),
        completed_sessions: window_sessions.len() as u32,
        day_streak: day_streak(&active_study_days(recent_sessions), now.date_naive()),
    }
}

//=========================================================================================
// Productivity score
//=========================================================================================

/// Raw counts feeding the productivity blend, all taken over the same
/// analysis window.
#[derive(Debug, Clone, Default)]
pub struct ProductivityInputs {
    /// Window length in days; clamped to at least one day.
    pub window_days: f64,
    pub completed_sessions: u32,
    pub total_minutes: f64,
    pub avg_engagement: f64,
    pub presence_samples: u32,
    pub distraction_samples: u32,
    pub total_samples: u32,
    /// Highlights plus annotations recorded in the window.
    pub activity_events: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductivityComponents {
    pub frequency: f64,
    pub time_on_task: f64,
    pub engagement: f64,
    pub presence: f64,
    pub focus: f64,
    pub activity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductivityScore {
    pub overall_score: f64,
    pub grade: Grade,
    pub components: ProductivityComponents,
}

fn capped_rate(per_day: f64, target_per_day: f64) -> f64 {
    (100.0 * per_day / target_per_day).min(100.0)
}

/// Blends six normalized [0,100] sub-scores with fixed weights and grades
/// the result.
pub fn productivity_score(inputs: &ProductivityInputs) -> ProductivityScore {
    let days = inputs.window_days.max(1.0);

    let frequency = capped_rate(
        inputs.completed_sessions as f64 / days,
        TARGET_SESSIONS_PER_DAY,
    );
    let time_on_task = capped_rate(inputs.total_minutes / days, TARGET_MINUTES_PER_DAY);
    let engagement = inputs.avg_engagement.clamp(0.0, 100.0);
    let presence = if inputs.total_samples == 0 {
        0.0
    } else {
        100.0 * inputs.presence_samples as f64 / inputs.total_samples as f64
    };
    let distraction_rate = if inputs.total_samples == 0 {
        0.0
    } else {
        100.0 * inputs.distraction_samples as f64 / inputs.total_samples as f64
    };
    let focus = 100.0 - distraction_rate;
    let activity = capped_rate(inputs.activity_events as f64 / days, TARGET_ACTIVITY_PER_DAY);

    let overall = frequency * WEIGHT_FREQUENCY
        + time_on_task * WEIGHT_TIME_ON_TASK
        + engagement * WEIGHT_ENGAGEMENT
        + presence * WEIGHT_PRESENCE
        + focus * WEIGHT_FOCUS
        + activity * WEIGHT_ACTIVITY;

    ProductivityScore {
        overall_score: (overall * 10.0).round() / 10.0,
        grade: letter_grade(overall),
        components: ProductivityComponents {
            frequency,
            time_on_task,
            engagement,
            presence,
            focus,
            activity,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::testutil::t0;
    use crate::domain::FinalMetrics;
    use uuid::Uuid;

    fn completed_session_on(date: NaiveDate, hours: f64, engagement: u32) -> Session {
        let ended = date
            .and_hms_opt(20, 0, 0)
            .expect("valid wall-clock time")
            .and_utc();
        let duration_seconds = (hours * 3600.0) as i64;
        Session {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            subject: None,
            started_at: ended - Duration::seconds(duration_seconds),
            ended_at: Some(ended),
            is_active: false,
            duration_seconds,
            metrics: Some(FinalMetrics {
                engagement_score: engagement,
                ..FinalMetrics::default()
            }),
            summary: None,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn streak_counts_consecutive_days_back_from_today() {
        let today = date(2025, 6, 10);
        let days: BTreeSet<NaiveDate> =
            [date(2025, 6, 10), date(2025, 6, 9), date(2025, 6, 8)].into();
        assert_eq!(day_streak(&days, today), 3);
    }

    #[test]
    fn streak_stops_at_the_first_gap() {
        let today = date(2025, 6, 10);
        // Active today and two days ago, but not yesterday.
        let days: BTreeSet<NaiveDate> = [date(2025, 6, 10), date(2025, 6, 8)].into();
        assert_eq!(day_streak(&days, today), 1);
    }

    #[test]
    fn streak_may_start_yesterday() {
        let today = date(2025, 6, 10);
        let days: BTreeSet<NaiveDate> = [date(2025, 6, 9), date(2025, 6, 8)].into();
        assert_eq!(day_streak(&days, today), 2);
    }

    #[test]
    fn stale_history_means_zero_streak() {
        let today = date(2025, 6, 10);
        let days: BTreeSet<NaiveDate> =
            [date(2025, 6, 7), date(2025, 6, 6), date(2025, 6, 5)].into();
        assert_eq!(day_streak(&days, today), 0);
    }

    #[test]
    fn overview_separates_window_totals_from_trailing_week() {
        let now = t0(); // 2025-06-01 09:00 UTC
        let in_week = completed_session_on(date(2025, 5, 30), 2.0, 80);
        let outside_week = completed_session_on(date(2025, 5, 10), 3.0, 60);
        let window = vec![in_week.clone(), outside_week.clone()];
        let recent = vec![in_week, outside_week];

        let stats = cross_session_overview(&window, &recent, now);
        assert_eq!(stats.total_hours, 5.0);
        assert_eq!(stats.week_hours, 2.0);
        assert_eq!(stats.avg_engagement, 70.0);
        assert_eq!(stats.completed_sessions, 2);
    }

    #[test]
    fn overview_of_nothing_is_all_zero() {
        let stats = cross_session_overview(&[], &[], t0());
        assert_eq!(stats.total_hours, 0.0);
        assert_eq!(stats.week_hours, 0.0);
        assert_eq!(stats.avg_engagement, 0.0);
        assert_eq!(stats.completed_sessions, 0);
        assert_eq!(stats.day_streak, 0);
    }

    #[test]
    fn productivity_sub_scores_cap_at_one_hundred() {
        let inputs = ProductivityInputs {
            window_days: 7.0,
            completed_sessions: 50,
            total_minutes: 7.0 * 1000.0,
            avg_engagement: 100.0,
            presence_samples: 10,
            distraction_samples: 0,
            total_samples: 10,
            activity_events: 1000,
        };
        let score = productivity_score(&inputs);
        assert_eq!(score.components.frequency, 100.0);
        assert_eq!(score.components.time_on_task, 100.0);
        assert_eq!(score.components.activity, 100.0);
        assert_eq!(score.overall_score, 100.0);
        assert_eq!(score.grade, Grade::APlus);
    }

    #[test]
    fn productivity_weights_blend_as_specified() {
        let inputs = ProductivityInputs {
            window_days: 10.0,
            completed_sessions: 5,   // 0.5/day -> 50
            total_minutes: 1200.0,   // 120/day -> 50
            avg_engagement: 80.0,
            presence_samples: 9,
            distraction_samples: 2,
            total_samples: 10,       // presence 90, focus 80
            activity_events: 100,    // 10/day -> 50
        };
        let score = productivity_score(&inputs);

        // 50*.15 + 50*.20 + 80*.25 + 90*.15 + 80*.15 + 50*.10 = 68.0
        assert_eq!(score.overall_score, 68.0);
        assert_eq!(score.grade, Grade::C);
        assert_eq!(score.components.presence, 90.0);
        assert_eq!(score.components.focus, 80.0);
    }

    #[test]
    fn grade_thresholds() {
        assert_eq!(letter_grade(95.0), Grade::APlus);
        assert_eq!(letter_grade(90.0), Grade::APlus);
        assert_eq!(letter_grade(87.0), Grade::A);
        assert_eq!(letter_grade(80.0), Grade::AMinus);
        assert_eq!(letter_grade(75.0), Grade::B);
        assert_eq!(letter_grade(65.0), Grade::C);
        assert_eq!(letter_grade(10.0), Grade::D);
    }
}
