use std::cmp::Reverse;

use super::domain::{ActivityRecord, MetricSnapshot};

/// Recompute a snapshot from the `window` most recent activities.
///
/// `activities` is expected in upload order; among rows sharing a date the later upload counts
/// as more recent. The snapshot is rebuilt wholesale, never patched incrementally.
pub fn snapshot_from_activities(activities: &[ActivityRecord], window: usize) -> MetricSnapshot {
    let mut recent: Vec<&ActivityRecord> = activities.iter().rev().collect();
    recent.sort_by_key(|activity| Reverse(activity.date));
    recent.truncate(window);

    if recent.is_empty() {
        return MetricSnapshot::default();
    }

    let count = recent.len();
    let on_time = recent.iter().filter(|activity| activity.on_time).count();
    let rating_total: f64 = recent.iter().map(|activity| activity.rating).sum();
    let incidents = recent
        .iter()
        .fold(0u32, |total, activity| total.saturating_add(activity.incidents));

    MetricSnapshot {
        completed_orders_30d: u32::try_from(count).unwrap_or(u32::MAX),
        on_time_rate: on_time as f64 / count as f64,
        avg_rating_30d: round_to_hundredths(rating_total / count as f64),
        incidents_30d: incidents,
    }
}

fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::rewards::domain::ActivityKind;
    use chrono::NaiveDate;

    fn activity(day: u32, on_time: bool, rating: f64, incidents: u32) -> ActivityRecord {
        ActivityRecord {
            date: NaiveDate::from_ymd_opt(2025, 6, day).expect("valid date"),
            kind: ActivityKind::Delivery,
            on_time,
            rating,
            distance_km: 4.2,
            incidents,
        }
    }

    #[test]
    fn empty_history_yields_zero_snapshot() {
        assert_eq!(snapshot_from_activities(&[], 60), MetricSnapshot::default());
    }

    #[test]
    fn aggregates_counts_rates_and_rounded_rating() {
        let activities = vec![
            activity(1, true, 4.0, 0),
            activity(2, false, 5.0, 1),
            activity(3, true, 4.0, 2),
        ];

        let snapshot = snapshot_from_activities(&activities, 60);

        assert_eq!(snapshot.completed_orders_30d, 3);
        assert!((snapshot.on_time_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(snapshot.avg_rating_30d, 4.33);
        assert_eq!(snapshot.incidents_30d, 3);
    }

    #[test]
    fn window_keeps_most_recent_dates() {
        let activities = vec![
            activity(10, true, 5.0, 0),
            activity(1, false, 1.0, 4),
            activity(20, true, 5.0, 0),
        ];

        let snapshot = snapshot_from_activities(&activities, 2);

        assert_eq!(snapshot.completed_orders_30d, 2);
        assert_eq!(snapshot.on_time_rate, 1.0);
        assert_eq!(snapshot.avg_rating_30d, 5.0);
        assert_eq!(snapshot.incidents_30d, 0);
    }

    #[test]
    fn incident_totals_saturate_instead_of_overflowing() {
        let activities = vec![
            activity(1, true, 5.0, u32::MAX),
            activity(2, true, 5.0, u32::MAX),
            activity(3, true, 5.0, 7),
        ];

        let snapshot = snapshot_from_activities(&activities, 60);

        assert_eq!(snapshot.incidents_30d, u32::MAX);
        assert_eq!(snapshot.completed_orders_30d, 3);
    }
}
