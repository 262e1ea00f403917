//! Calendar object model consumed by the schedule engine.
//!
//! These types are built once by the ICS parser and never mutated afterwards.
//! Recurrence expansion works on fresh [`Occurrence`] values instead.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::timezone::Timezone;

/// A time value as written in the calendar, before any timezone resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTime {
    /// All-day value, treated as local midnight.
    Date(NaiveDate),
    /// Already UTC (`...Z`); never shifted by a timezone.
    DateTimeUtc(DateTime<Utc>),
    /// Floating local time, resolved with the calendar's default timezone.
    DateTimeFloating(NaiveDateTime),
    /// Local time tagged with a TZID.
    DateTimeZoned { datetime: NaiveDateTime, tzid: String },
}

impl EventTime {
    /// Wall-clock reading of this time. UTC values read as their UTC wall clock.
    pub fn local(&self) -> NaiveDateTime {
        match self {
            EventTime::Date(d) => d.and_time(NaiveTime::MIN),
            EventTime::DateTimeUtc(dt) => dt.naive_utc(),
            EventTime::DateTimeFloating(dt) => *dt,
            EventTime::DateTimeZoned { datetime, .. } => *datetime,
        }
    }

    pub fn is_utc(&self) -> bool {
        matches!(self, EventTime::DateTimeUtc(_))
    }

    pub fn tzid(&self) -> Option<&str> {
        match self {
            EventTime::DateTimeZoned { tzid, .. } => Some(tzid),
            _ => None,
        }
    }

    /// The same kind of time at another wall-clock reading.
    ///
    /// A date moved off midnight becomes a floating date-time.
    pub fn with_local(&self, local: NaiveDateTime) -> EventTime {
        match self {
            EventTime::Date(_) if local.time() == NaiveTime::MIN => EventTime::Date(local.date()),
            EventTime::Date(_) => EventTime::DateTimeFloating(local),
            EventTime::DateTimeUtc(_) => EventTime::DateTimeUtc(local.and_utc()),
            EventTime::DateTimeFloating(_) => EventTime::DateTimeFloating(local),
            EventTime::DateTimeZoned { tzid, .. } => EventTime::DateTimeZoned {
                datetime: local,
                tzid: tzid.clone(),
            },
        }
    }

    /// Shift the wall clock by `duration`. `None` on overflow.
    pub fn checked_add(&self, duration: Duration) -> Option<EventTime> {
        let local = self.local().checked_add_signed(duration)?;
        Some(self.with_local(local))
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EventTime::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            EventTime::DateTimeUtc(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%SZ")),
            EventTime::DateTimeFloating(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
            EventTime::DateTimeZoned { datetime, tzid } => {
                write!(f, "{} ({})", datetime.format("%Y-%m-%dT%H:%M:%S"), tzid)
            }
        }
    }
}

/// One concrete or template instance of an event.
///
/// Usable only when `end` or `duration` is present.
#[derive(Debug, Clone, PartialEq)]
pub struct Occurrence {
    pub start: EventTime,
    pub end: Option<EventTime>,
    pub duration: Option<Duration>,
}

/// RRULE, RDATE and EXDATE values of a master event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recurrence {
    /// Only the first RRULE of an event is kept.
    pub rrule: Option<String>,
    pub rdates: Vec<EventTime>,
    pub exdates: Vec<EventTime>,
}

impl Recurrence {
    pub fn is_empty(&self) -> bool {
        self.rrule.is_none() && self.rdates.is_empty() && self.exdates.is_empty()
    }
}

/// A single VEVENT.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub uid: Option<String>,
    pub summary: Option<String>,
    /// Base instance: DTSTART plus DTEND and/or DURATION.
    pub occurrence: Occurrence,
    pub recurrence: Option<Recurrence>,
}

impl Event {
    /// Label for log output.
    pub fn label(&self) -> &str {
        self.uid
            .as_deref()
            .or(self.summary.as_deref())
            .unwrap_or("(no uid)")
    }
}

/// A parsed VCALENDAR: its events in document order plus the timezones they reference.
#[derive(Debug, Clone, Default)]
pub struct Calendar {
    pub events: Vec<Event>,
    pub timezones: Vec<Timezone>,
    /// TZID used for floating times and for zoned times with no known definition.
    pub default_tzid: Option<String>,
}

impl Calendar {
    pub fn timezone(&self, tzid: &str) -> Option<&Timezone> {
        self.timezones.iter().find(|tz| tz.tzid() == tzid)
    }

    pub fn default_timezone(&self) -> Option<&Timezone> {
        self.default_tzid.as_deref().and_then(|id| self.timezone(id))
    }

    /// Timezone used to resolve `time`: its own TZID when known, otherwise the default.
    pub fn timezone_for(&self, time: &EventTime) -> Option<&Timezone> {
        time.tzid()
            .and_then(|id| self.timezone(id))
            .or_else(|| self.default_timezone())
    }

    /// Unix seconds of `time`, resolved in its own timezone.
    pub fn to_unix(&self, time: &EventTime) -> i64 {
        crate::timezone::to_unix(self.timezone_for(time), time)
    }

    /// Register a timezone. The first one registered becomes the default.
    pub fn add_timezone(&mut self, timezone: Timezone) {
        if self.timezone(timezone.tzid()).is_some() {
            return;
        }
        if self.default_tzid.is_none() {
            self.default_tzid = Some(timezone.tzid().to_string());
        }
        self.timezones.push(timezone);
    }
}
