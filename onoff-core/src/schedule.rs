//! Schedule building: every event in a calendar to a flat list of UTC intervals.

use std::fmt;
use std::path::Path;

use crate::config::Limits;
use crate::error::OnOffResult;
use crate::event::Calendar;
use crate::liveness::is_done;
use crate::normalize::{NormalizedOccurrence, normalize};
use crate::recurrence::{Expansion, expand_event};

/// An on/off window in unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: i64,
    pub end: i64,
}

impl Interval {
    /// Resolve both ends of a local occurrence to UTC, each in its own timezone.
    pub fn resolve(calendar: &Calendar, occurrence: &NormalizedOccurrence) -> Self {
        Interval {
            start: calendar.to_unix(&occurrence.start),
            end: calendar.to_unix(&occurrence.end),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{},{}", self.start, self.end)
    }
}

/// Intervals in event processing order. Not sorted, not deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    intervals: Vec<Interval>,
}

impl Schedule {
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// `start,end` lines, newline terminated. An empty schedule is a lone newline.
    pub fn to_text(&self) -> String {
        let lines: Vec<String> = self.intervals.iter().map(Interval::to_string).collect();
        format!("{}\n", lines.join("\n"))
    }

    pub fn write_to(&self, path: &Path) -> OnOffResult<()> {
        std::fs::write(path, self.to_text())?;
        Ok(())
    }
}

impl IntoIterator for Schedule {
    type Item = Interval;
    type IntoIter = std::vec::IntoIter<Interval>;

    fn into_iter(self) -> Self::IntoIter {
        self.intervals.into_iter()
    }
}

/// Build the schedule for `calendar` as seen at `reference` (unix seconds).
///
/// Events are visited in document order. Once `limits.max_total_instances`
/// intervals are collected, no further event is looked at.
pub fn build_schedule(calendar: &Calendar, reference: i64, limits: &Limits) -> Schedule {
    let mut intervals: Vec<Interval> = Vec::new();

    for event in &calendar.events {
        let remaining = limits.max_total_instances.saturating_sub(intervals.len());
        if remaining == 0 {
            tracing::info!(
                max_total_instances = limits.max_total_instances,
                "Instance cap reached, ignoring remaining events"
            );
            break;
        }

        match expand_event(calendar, event, reference, limits, remaining) {
            Expansion::Expanded(found) => intervals.extend(found),
            Expansion::NotRecurring => {
                let Some(normalized) = normalize(&event.occurrence) else {
                    tracing::warn!(
                        event = event.label(),
                        "Event has neither DTEND nor DURATION, skipping"
                    );
                    continue;
                };

                if is_done(calendar, &event.occurrence, reference) {
                    tracing::debug!(
                        event = event.label(),
                        end = %normalized.end,
                        "Event already ended"
                    );
                    continue;
                }

                intervals.push(Interval::resolve(calendar, &normalized));
            }
        }
    }

    Schedule { intervals }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, EventTime, Occurrence, Recurrence};
    use crate::timezone::{Observance, ObservanceKind, Timezone, VTimezone};
    use chrono::{DateTime, Duration};

    fn floating(secs: i64) -> EventTime {
        EventTime::DateTimeFloating(DateTime::from_timestamp(secs, 0).unwrap().naive_utc())
    }

    fn single(start: i64, end: Option<i64>, duration: Option<i64>) -> Event {
        Event {
            uid: None,
            summary: None,
            occurrence: Occurrence {
                start: floating(start),
                end: end.map(floating),
                duration: duration.map(Duration::seconds),
            },
            recurrence: None,
        }
    }

    fn hourly(start: i64, count: u32) -> Event {
        Event {
            recurrence: Some(Recurrence {
                rrule: Some(format!("FREQ=HOURLY;COUNT={count}")),
                ..Recurrence::default()
            }),
            ..single(start, None, Some(600))
        }
    }

    fn calendar(events: Vec<Event>) -> Calendar {
        Calendar {
            events,
            ..Calendar::default()
        }
    }

    fn lines(schedule: &Schedule) -> Vec<String> {
        schedule.intervals().iter().map(Interval::to_string).collect()
    }

    #[test]
    fn test_live_single_event() {
        let schedule = build_schedule(
            &calendar(vec![single(1000, Some(2000), None)]),
            500,
            &Limits::default(),
        );
        assert_eq!(lines(&schedule), vec!["1000,2000"]);
    }

    #[test]
    fn test_finished_single_event_dropped() {
        let schedule = build_schedule(
            &calendar(vec![single(1000, Some(2000), None)]),
            2500,
            &Limits::default(),
        );
        assert!(schedule.is_empty());
    }

    #[test]
    fn test_zero_reference_drops_everything() {
        let schedule = build_schedule(
            &calendar(vec![single(1000, None, Some(500)), hourly(0, 3)]),
            0,
            &Limits::default(),
        );
        assert!(schedule.is_empty());
    }

    #[test]
    fn test_duration_only_event() {
        let schedule = build_schedule(
            &calendar(vec![single(1000, None, Some(500))]),
            1,
            &Limits::default(),
        );
        assert_eq!(lines(&schedule), vec!["1000,1500"]);
    }

    #[test]
    fn test_malformed_event_skipped() {
        let schedule = build_schedule(
            &calendar(vec![single(1000, None, None), single(3000, Some(4000), None)]),
            1,
            &Limits::default(),
        );
        assert_eq!(lines(&schedule), vec!["3000,4000"]);
    }

    #[test]
    fn test_timezone_offset_applied_to_both_ends() {
        let mut cal = calendar(vec![single(1000, Some(2000), None)]);
        cal.add_timezone(Timezone::Defined(VTimezone {
            tzid: "Behind".to_string(),
            observances: vec![Observance::new(
                ObservanceKind::Standard,
                floating(0).local(),
                -3600,
                -3600,
                None,
                vec![],
            )],
        }));

        let schedule = build_schedule(&cal, 1, &Limits::default());
        assert_eq!(lines(&schedule), vec!["4600,5600"]);
    }

    #[test]
    fn test_order_follows_events_without_sorting() {
        let schedule = build_schedule(
            &calendar(vec![
                single(9000, Some(9500), None),
                hourly(0, 2),
                single(9000, Some(9500), None),
            ]),
            1,
            &Limits::default(),
        );
        assert_eq!(
            lines(&schedule),
            vec!["9000,9500", "0,600", "3600,4200", "9000,9500"]
        );
    }

    #[test]
    fn test_global_cap_stops_later_events() {
        let limits = Limits {
            max_recurrence_per_event: 100,
            max_total_instances: 4,
        };
        let schedule = build_schedule(
            &calendar(vec![hourly(0, 3), hourly(100_000, 3), single(1000, Some(2000), None)]),
            1,
            &limits,
        );
        assert_eq!(
            lines(&schedule),
            vec!["0,600", "3600,4200", "7200,7800", "100000,100600"]
        );
    }

    #[test]
    fn test_global_cap_never_exceeded() {
        let events: Vec<Event> = (0..10).map(|i| hourly(i * 100_000, 30)).collect();
        let limits = Limits {
            max_recurrence_per_event: 25,
            max_total_instances: 60,
        };
        let schedule = build_schedule(&calendar(events), 1, &limits);
        assert_eq!(schedule.len(), 60);
    }

    #[test]
    fn test_text_output() {
        let schedule = build_schedule(&calendar(vec![hourly(0, 2)]), 1, &Limits::default());
        assert_eq!(schedule.to_text(), "0,600\n3600,4200\n");
        assert_eq!(Schedule::default().to_text(), "\n");
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("onoff.txt");
        let schedule = build_schedule(
            &calendar(vec![single(1000, Some(2000), None)]),
            1,
            &Limits::default(),
        );

        schedule.write_to(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "1000,2000\n");
    }
}
