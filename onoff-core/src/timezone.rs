//! Timezone resolution: local wall-clock time to UTC offset.
//!
//! Offsets are signed seconds east of UTC, so `utc = local - offset`.

use chrono::{Duration, NaiveDateTime, Offset, TimeZone};
use rrule::RRuleSet;

use crate::event::EventTime;
use crate::rule::{floating_set, from_rrule_time, utc_until_into};

/// A timezone a calendar's times can be resolved against.
#[derive(Debug, Clone)]
pub enum Timezone {
    /// Inline VTIMEZONE definition.
    Defined(VTimezone),
    /// IANA zone named by a TZID or X-WR-TIMEZONE with no inline definition.
    Named(chrono_tz::Tz),
}

impl Timezone {
    pub fn tzid(&self) -> &str {
        match self {
            Timezone::Defined(vtz) => &vtz.tzid,
            Timezone::Named(tz) => tz.name(),
        }
    }

    /// Offset in effect at `local`, or `None` if the zone carries no rules.
    pub fn offset_at(&self, local: NaiveDateTime) -> Option<i64> {
        match self {
            Timezone::Defined(vtz) => vtz.offset_at(local),
            Timezone::Named(tz) => {
                let offset = tz
                    .offset_from_local_datetime(&local)
                    .earliest()
                    // Local time skipped by a DST jump: read it as UTC instead.
                    .unwrap_or_else(|| tz.offset_from_utc_datetime(&local));
                Some(i64::from(offset.fix().local_minus_utc()))
            }
        }
    }
}

/// Offset of `local` under `tz`. No timezone, or one that can't answer, means 0.
pub fn resolve_offset(tz: Option<&Timezone>, local: NaiveDateTime) -> i64 {
    let Some(tz) = tz else {
        return 0;
    };

    tz.offset_at(local).unwrap_or_else(|| {
        tracing::warn!(tzid = tz.tzid(), %local, "Unresolvable local time, using UTC");
        0
    })
}

/// Unix seconds of `time`. UTC values ignore `tz`.
pub fn to_unix(tz: Option<&Timezone>, time: &EventTime) -> i64 {
    let local = time.local();
    let wall = local.and_utc().timestamp();

    if time.is_utc() {
        wall
    } else {
        wall - resolve_offset(tz, local)
    }
}

/// Wall-clock reading of the UTC instant `utc` under `tz`.
pub fn to_local(tz: Option<&Timezone>, utc: NaiveDateTime) -> NaiveDateTime {
    let shift = |offset: i64| utc.checked_add_signed(Duration::seconds(offset)).unwrap_or(utc);

    // Offsets are keyed by local time; a second lookup settles readings near a transition.
    let guess = shift(resolve_offset(tz, utc));
    shift(resolve_offset(tz, guess))
}

/// Parse a UTC offset in iCalendar form: `+HHMM` or `+HHMMSS`.
pub fn parse_utc_offset(s: &str) -> Option<i64> {
    let s = s.trim();
    let (sign, digits) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };

    if !(digits.len() == 4 || digits.len() == 6) || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let hours: i64 = digits[0..2].parse().ok()?;
    let minutes: i64 = digits[2..4].parse().ok()?;
    let seconds: i64 = digits.get(4..6).map_or(Some(0), |s| s.parse().ok())?;

    Some(sign * (hours * 3600 + minutes * 60 + seconds))
}

/// A VTIMEZONE component.
#[derive(Debug, Clone)]
pub struct VTimezone {
    pub tzid: String,
    pub observances: Vec<Observance>,
}

impl VTimezone {
    /// Offset of the latest observance that started at or before `local`.
    ///
    /// Before every transition the earliest observance's TZOFFSETFROM applies.
    pub fn offset_at(&self, local: NaiveDateTime) -> Option<i64> {
        let latest = self
            .observances
            .iter()
            .filter_map(|obs| obs.latest_onset(local).map(|onset| (onset, obs)))
            .max_by_key(|(onset, _)| *onset);

        match latest {
            Some((_, obs)) => Some(obs.offset_to),
            None => self
                .observances
                .iter()
                .min_by_key(|obs| obs.dtstart)
                .map(|obs| obs.offset_from),
        }
    }
}

/// A STANDARD or DAYLIGHT sub-component.
#[derive(Debug, Clone)]
pub struct Observance {
    pub kind: ObservanceKind,
    pub dtstart: NaiveDateTime,
    pub offset_from: i64,
    pub offset_to: i64,
    pub name: Option<String>,
    rdates: Vec<NaiveDateTime>,
    onsets: Option<RRuleSet>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservanceKind {
    Standard,
    Daylight,
}

impl Observance {
    /// Build an observance. An RRULE the rrule crate rejects is dropped with a
    /// warning, leaving DTSTART and RDATEs as the only onsets.
    pub fn new(
        kind: ObservanceKind,
        dtstart: NaiveDateTime,
        offset_from: i64,
        offset_to: i64,
        rrule: Option<&str>,
        rdates: Vec<NaiveDateTime>,
    ) -> Self {
        // Onsets are in the local time before the change; a UTC UNTIL is shifted into it.
        let rrule = rrule.map(|rule| {
            utc_until_into(rule, |utc| {
                utc.checked_add_signed(Duration::seconds(offset_from)).unwrap_or(utc)
            })
        });
        let onsets = rrule.as_deref().and_then(|rule| match floating_set(dtstart, Some(rule)) {
            Ok(set) => Some(set),
            Err(e) => {
                tracing::warn!(rule, error = %e, "Ignoring unusable timezone RRULE");
                None
            }
        });

        Observance {
            kind,
            dtstart,
            offset_from,
            offset_to,
            name: None,
            rdates,
            onsets,
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    /// Most recent onset of this observance at or before `local`.
    fn latest_onset(&self, local: NaiveDateTime) -> Option<NaiveDateTime> {
        if local < self.dtstart {
            return None;
        }

        let from_rule = self.onsets.as_ref().and_then(|set| {
            set.into_iter()
                .map(|dt| from_rrule_time(&dt))
                .take_while(|onset| *onset <= local)
                .last()
        });

        let from_rdates = self.rdates.iter().copied().filter(|rdate| *rdate <= local).max();

        [Some(self.dtstart), from_rule, from_rdates]
            .into_iter()
            .flatten()
            .max()
    }
}
