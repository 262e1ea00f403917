//! Thin layer over the rrule crate that works in floating wall-clock time.
//!
//! rrule wants zoned datetimes. Floating values ride along as UTC and come
//! back out unchanged; the actual zone is applied later by the resolver.

use chrono::{DateTime, NaiveDateTime, Utc};
use rrule::{RRuleError, RRuleSet, Tz};

pub(crate) fn to_rrule_time(local: NaiveDateTime) -> DateTime<Tz> {
    let tz: Tz = Utc.into();
    local.and_utc().with_timezone(&tz)
}

pub(crate) fn from_rrule_time(dt: &DateTime<Tz>) -> NaiveDateTime {
    dt.naive_utc()
}

/// Recurrence set anchored at `dtstart`.
///
/// Without a rule the set holds DTSTART alone; callers add RDATEs/EXDATEs on top.
pub(crate) fn floating_set(
    dtstart: NaiveDateTime,
    rrule: Option<&str>,
) -> Result<RRuleSet, RRuleError> {
    match rrule {
        Some(rule) => format!(
            "DTSTART:{}Z\nRRULE:{}",
            dtstart.format("%Y%m%dT%H%M%S"),
            floating_until(rule)
        )
        .parse(),
        None => Ok(RRuleSet::new(to_rrule_time(dtstart)).rdate(to_rrule_time(dtstart))),
    }
}

/// Rewrite UNTIL so it lives in the same (UTC-tagged) frame as DTSTART.
///
/// `UNTIL=20240110` becomes the last second of that day, and `UNTIL=20240110T100000`
/// gains a `Z`.
fn floating_until(rule: &str) -> String {
    rule.split(';')
        .map(|part| match part.split_once('=') {
            Some((key, value)) if key.eq_ignore_ascii_case("UNTIL") => {
                if value.len() == 8 {
                    format!("{key}={value}T235959Z")
                } else if !value.ends_with('Z') {
                    format!("{key}={value}Z")
                } else {
                    part.to_string()
                }
            }
            _ => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Rewrite a UTC (`Z`) UNTIL through `to_frame`, leaving every other part alone.
///
/// rrule compares UNTIL against candidates in DTSTART's frame, so a zoned
/// master needs its UTC bound moved to local wall-clock time first.
pub(crate) fn utc_until_into(
    rule: &str,
    to_frame: impl Fn(NaiveDateTime) -> NaiveDateTime,
) -> String {
    rule.split(';')
        .map(|part| match part.split_once('=') {
            Some((key, value)) if key.eq_ignore_ascii_case("UNTIL") => {
                match NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%SZ") {
                    Ok(utc) => format!("{key}={}Z", to_frame(utc).format("%Y%m%dT%H%M%S")),
                    Err(_) => part.to_string(),
                }
            }
            _ => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}
