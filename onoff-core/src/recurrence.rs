//! Recurrence expansion for recurring events.
//!
//! A master event's RRULE, RDATEs and EXDATEs are combined into one recurrence
//! set, walked lazily in the event's local frame. Each candidate becomes a fresh
//! occurrence that goes through the liveness filter before it is kept.

use chrono::{DateTime, Duration, NaiveDateTime};
use rrule::RRuleSet;

use crate::config::Limits;
use crate::error::{OnOffError, OnOffResult};
use crate::event::{Calendar, Event, EventTime, Occurrence, Recurrence};
use crate::liveness::is_done;
use crate::normalize::normalize;
use crate::rule::{floating_set, from_rrule_time, to_rrule_time, utc_until_into};
use crate::schedule::Interval;
use crate::timezone::to_local;

/// Which recurrence signals an event carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceKind {
    /// Single occurrence.
    None,
    /// RRULE without exceptions.
    RuleBased,
    /// RDATEs only, no RRULE and no EXDATEs.
    DatesOnly,
    /// EXDATEs present, with or without a rule or dates.
    WithExceptions,
}

impl RecurrenceKind {
    pub fn of(event: &Event) -> Self {
        let Some(recurrence) = &event.recurrence else {
            return RecurrenceKind::None;
        };

        if !recurrence.exdates.is_empty() {
            RecurrenceKind::WithExceptions
        } else if recurrence.rrule.is_some() {
            RecurrenceKind::RuleBased
        } else if !recurrence.rdates.is_empty() {
            RecurrenceKind::DatesOnly
        } else {
            RecurrenceKind::None
        }
    }

    pub fn is_recurring(self) -> bool {
        self != RecurrenceKind::None
    }
}

/// Outcome of [`expand_event`].
#[derive(Debug, Clone, PartialEq)]
pub enum Expansion {
    /// No recurrence signal; the caller handles the event as a single occurrence.
    NotRecurring,
    /// The event was recurring and these are its surviving instances (possibly none).
    Expanded(Vec<Interval>),
}

/// Expand a recurring event into UTC intervals.
///
/// At most `min(limits.max_recurrence_per_event, remaining)` intervals are
/// returned, where `remaining` is what is left of the schedule-wide budget.
pub fn expand_event(
    calendar: &Calendar,
    event: &Event,
    reference: i64,
    limits: &Limits,
    remaining: usize,
) -> Expansion {
    let kind = RecurrenceKind::of(event);
    let Some(recurrence) = event.recurrence.as_ref().filter(|_| kind.is_recurring()) else {
        return Expansion::NotRecurring;
    };

    let Some(duration) = template_duration(calendar, &event.occurrence) else {
        tracing::warn!(
            event = event.label(),
            "Recurring event has neither DTEND nor DURATION, skipping"
        );
        return Expansion::Expanded(Vec::new());
    };

    let set = match recurrence_set(calendar, &event.occurrence.start, recurrence) {
        Ok(set) => set,
        Err(e) => {
            tracing::warn!(event = event.label(), error = %e, "Skipping event");
            return Expansion::Expanded(Vec::new());
        }
    };

    let budget = limits.max_recurrence_per_event.min(remaining);
    let candidates = (&set).into_iter().map(|dt| from_rrule_time(&dt));
    let intervals = expand_candidates(
        calendar,
        &event.occurrence.start,
        duration,
        candidates,
        reference,
        budget,
    );

    tracing::debug!(
        event = event.label(),
        ?kind,
        instances = intervals.len(),
        budget,
        "Expanded recurring event"
    );

    Expansion::Expanded(intervals)
}

/// Turn candidate start times (local wall clock, ascending) into intervals.
///
/// Each candidate gets `end = start + duration`. Candidates that are already over
/// are skipped without using up `budget`; expansion stops once `budget` intervals
/// are collected or the candidates run out.
pub fn expand_candidates<I>(
    calendar: &Calendar,
    template_start: &EventTime,
    duration: Duration,
    candidates: I,
    reference: i64,
    budget: usize,
) -> Vec<Interval>
where
    I: IntoIterator<Item = NaiveDateTime>,
{
    let mut intervals = Vec::new();

    // Every candidate would be done; don't walk a possibly endless rule.
    if budget == 0 || reference <= 0 {
        return intervals;
    }

    for local in candidates {
        let occurrence = Occurrence {
            start: template_start.with_local(local),
            end: None,
            duration: Some(duration),
        };

        if is_done(calendar, &occurrence, reference) {
            continue;
        }

        let Some(normalized) = normalize(&occurrence) else {
            continue;
        };

        intervals.push(Interval::resolve(calendar, &normalized));
        if intervals.len() >= budget {
            break;
        }
    }

    intervals
}

/// Length of every instance: DTEND - DTSTART if DTEND is given, else DURATION.
///
/// Each end is resolved in its own timezone.
fn template_duration(calendar: &Calendar, occurrence: &Occurrence) -> Option<Duration> {
    match (&occurrence.end, occurrence.duration) {
        (Some(end), _) => Some(Duration::seconds(
            calendar.to_unix(end) - calendar.to_unix(&occurrence.start),
        )),
        (None, Some(duration)) => Some(duration),
        (None, None) => None,
    }
}

/// Build the recurrence set in the local frame of `start`.
fn recurrence_set(
    calendar: &Calendar,
    start: &EventTime,
    recurrence: &Recurrence,
) -> OnOffResult<RRuleSet> {
    // UNTIL in UTC has to be read in the same frame the rule is walked in.
    let rrule = recurrence.rrule.as_deref().map(|rule| {
        if start.is_utc() {
            rule.to_string()
        } else {
            utc_until_into(rule, |utc| to_local(calendar.timezone_for(start), utc))
        }
    });

    let mut set = floating_set(start.local(), rrule.as_deref()).map_err(|e| {
        OnOffError::Recurrence(format!(
            "Failed to parse RRULE '{}': {}",
            recurrence.rrule.as_deref().unwrap_or_default(),
            e
        ))
    })?;

    for rdate in &recurrence.rdates {
        set = set.rdate(to_rrule_time(in_frame_of(calendar, start, rdate)));
    }
    for exdate in &recurrence.exdates {
        set = set.exdate(to_rrule_time(in_frame_of(calendar, start, exdate)));
    }

    Ok(set)
}

/// Wall-clock reading of `value` in the frame `start` is expanded in.
///
/// UTC masters expand in UTC; everything else expands in the local time of
/// the start's timezone. Values in another zone go through UTC first.
fn in_frame_of(calendar: &Calendar, start: &EventTime, value: &EventTime) -> NaiveDateTime {
    let local = value.local();
    let start_tz = calendar.timezone_for(start);

    if start.is_utc() == value.is_utc() {
        let same_zone = match (start_tz, calendar.timezone_for(value)) {
            (Some(a), Some(b)) => a.tzid() == b.tzid(),
            (None, None) => true,
            _ => false,
        };
        if start.is_utc() || same_zone {
            return local;
        }
    }

    let Some(utc) = DateTime::from_timestamp(calendar.to_unix(value), 0) else {
        return local;
    };

    if start.is_utc() {
        utc.naive_utc()
    } else {
        to_local(start_tz, utc.naive_utc())
    }
}
