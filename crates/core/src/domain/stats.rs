//! Average inter-arrival gap per event type.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use super::queue::EventQueue;

/// Event type to formatted average gap, e.g. `{"PushEvent": "0:00:20"}`
pub type Statistics = BTreeMap<String, String>;

const MICROS_PER_SECOND: i64 = 1_000_000;
const SECONDS_PER_DAY: i64 = 86_400;

/// Average gap for every event type present in the queue.
///
/// An empty queue yields an empty map; a type seen once (or only without
/// timestamps) yields the zero duration.
pub fn compute(queue: &EventQueue) -> Statistics {
    queue
        .types()
        .into_iter()
        .map(|kind| {
            let average = average_gap(queue, &kind);
            (kind, format_duration(average))
        })
        .collect()
}

/// Mean gap between consecutive timestamps of events of `kind`.
/// Events without a timestamp are left out.
pub fn average_gap(queue: &EventQueue, kind: &str) -> Duration {
    let mut timestamps: Vec<DateTime<Utc>> = queue
        .events_of_type(kind)
        .filter_map(|event| event.created_at)
        .collect();
    timestamps.sort();

    let gaps: Vec<f64> = timestamps
        .windows(2)
        .map(|pair| gap_seconds(pair[0], pair[1]))
        .collect();

    if gaps.is_empty() {
        return Duration::zero();
    }

    let average = gaps.iter().sum::<f64>() / gaps.len() as f64;
    let micros = (average * MICROS_PER_SECOND as f64).round_ties_even();
    Duration::microseconds(micros as i64)
}

fn gap_seconds(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let delta = later - earlier;
    match delta.num_microseconds() {
        Some(micros) => micros as f64 / MICROS_PER_SECOND as f64,
        None => delta.num_seconds() as f64,
    }
}

/// Render a duration as `H:MM:SS`, with a `.ffffff` suffix when there are
/// leftover microseconds and an `N day(s), ` prefix past 24 hours.
pub fn format_duration(duration: Duration) -> String {
    let total_micros = duration.num_microseconds().unwrap_or(i64::MAX).max(0);
    let total_seconds = total_micros / MICROS_PER_SECOND;
    let micros = total_micros % MICROS_PER_SECOND;

    let days = total_seconds / SECONDS_PER_DAY;
    let rest = total_seconds % SECONDS_PER_DAY;
    let (hours, minutes, seconds) = (rest / 3600, (rest % 3600) / 60, rest % 60);

    let mut out = String::new();
    if days > 0 {
        let unit = if days == 1 { "day" } else { "days" };
        out.push_str(&format!("{days} {unit}, "));
    }
    out.push_str(&format!("{hours}:{minutes:02}:{seconds:02}"));
    if micros > 0 {
        out.push_str(&format!(".{micros:06}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::{Event, EventId};
    use chrono::TimeZone;

    fn at(offset_secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap() + Duration::seconds(offset_secs)
    }

    #[test]
    fn test_compute_empty_queue() {
        assert!(compute(&EventQueue::new(10)).is_empty());
    }

    #[test]
    fn test_single_event_is_zero_duration() {
        let queue = EventQueue::from_events(10, vec![Event::new("1", "WatchEvent", at(0))]);
        let stats = compute(&queue);
        assert_eq!(stats.get("WatchEvent").map(String::as_str), Some("0:00:00"));
    }

    #[test]
    fn test_push_events_average_gap() {
        let queue = EventQueue::from_events(
            10,
            vec![
                Event::new("1", "PushEvent", at(0)),
                Event::new("2", "PushEvent", at(10)),
                Event::new("3", "PushEvent", at(30)),
            ],
        );

        let stats = compute(&queue);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats["PushEvent"], "0:00:20");
    }

    #[test]
    fn test_timestamps_are_sorted_before_gaps() {
        // Queue order differs from time order
        let queue = EventQueue::from_events(
            10,
            vec![
                Event::new("1", "IssuesEvent", at(60)),
                Event::new("2", "IssuesEvent", at(0)),
                Event::new("3", "IssuesEvent", at(90)),
            ],
        );
        assert_eq!(average_gap(&queue, "IssuesEvent"), Duration::seconds(45));
    }

    #[test]
    fn test_types_are_computed_independently() {
        let queue = EventQueue::from_events(
            10,
            vec![
                Event::new("1", "PushEvent", at(0)),
                Event::new("2", "WatchEvent", at(5)),
                Event::new("3", "PushEvent", at(3600)),
                Event::new("4", "WatchEvent", at(7)),
            ],
        );

        let stats = compute(&queue);
        assert_eq!(stats["PushEvent"], "1:00:00");
        assert_eq!(stats["WatchEvent"], "0:00:02");
    }

    #[test]
    fn test_missing_timestamps_are_skipped() {
        let undated = Event {
            id: EventId::from("2"),
            kind: Some("ForkEvent".to_string()),
            created_at: None,
        };
        let queue = EventQueue::from_events(
            10,
            vec![
                Event::new("1", "ForkEvent", at(0)),
                undated,
                Event::new("3", "ForkEvent", at(12)),
            ],
        );

        assert_eq!(compute(&queue)["ForkEvent"], "0:00:12");
    }

    #[test]
    fn test_type_with_only_undated_events_is_zero() {
        let queue = EventQueue::from_events(
            10,
            vec![Event {
                id: EventId::from("1"),
                kind: Some("GollumEvent".to_string()),
                created_at: None,
            }],
        );
        assert_eq!(compute(&queue)["GollumEvent"], "0:00:00");
    }

    #[test]
    fn test_fractional_average() {
        let queue = EventQueue::from_events(
            10,
            vec![
                Event::new("1", "PushEvent", at(0)),
                Event::new("2", "PushEvent", at(1)),
                Event::new("3", "PushEvent", at(3)),
                Event::new("4", "PushEvent", at(4)),
            ],
        );
        // 4s over 3 gaps
        assert_eq!(compute(&queue)["PushEvent"], "0:00:01.333333");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::zero()), "0:00:00");
        assert_eq!(format_duration(Duration::seconds(20)), "0:00:20");
        assert_eq!(format_duration(Duration::seconds(3 * 3600 + 5 * 60 + 9)), "3:05:09");
        assert_eq!(format_duration(Duration::milliseconds(1500)), "0:00:01.500000");
        assert_eq!(format_duration(Duration::seconds(86_400 + 61)), "1 day, 0:01:01");
        assert_eq!(format_duration(Duration::days(3) + Duration::hours(12)), "3 days, 12:00:00");
    }
}
