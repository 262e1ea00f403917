//! ICS parsing using the icalendar crate's parser.

use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use icalendar::{
    CalendarDateTime, DatePerhapsTime,
    parser::{Component, Property, read_calendar, unfold},
};

use crate::error::{OnOffError, OnOffResult};
use crate::event::{Calendar, Event, EventTime, Occurrence, Recurrence};
use crate::timezone::{Observance, ObservanceKind, Timezone, VTimezone, parse_utc_offset};

/// Parse ICS content into a [`Calendar`].
///
/// VEVENTs without a usable DTSTART are dropped. The first VTIMEZONE becomes the
/// calendar's default timezone, with X-WR-TIMEZONE as a fallback.
pub fn parse_calendar(content: &str) -> OnOffResult<Calendar> {
    let unfolded = unfold(content);
    let parsed = read_calendar(&unfolded).map_err(|e| OnOffError::IcsParse(e.to_string()))?;

    let mut calendar = Calendar::default();

    for vtimezone in parsed.components.iter().filter(|c| c.name == "VTIMEZONE") {
        match parse_vtimezone(vtimezone) {
            Some(vtz) => calendar.add_timezone(Timezone::Defined(vtz)),
            None => tracing::warn!("Ignoring VTIMEZONE without TZID"),
        }
    }

    if let Some(tz) = parsed
        .properties
        .iter()
        .find(|p| p.name == "X-WR-TIMEZONE")
        .and_then(|p| chrono_tz::Tz::from_str(p.val.as_ref()).ok())
    {
        calendar.add_timezone(Timezone::Named(tz));
    }

    for vevent in parsed.components.iter().filter(|c| c.name == "VEVENT") {
        match parse_event(vevent) {
            Some(event) => calendar.events.push(event),
            None => tracing::warn!(
                uid = vevent.find_prop("UID").map(|p| p.val.as_ref()),
                "Skipping VEVENT without a valid DTSTART"
            ),
        }
    }

    register_named_timezones(&mut calendar);

    Ok(calendar)
}

/// Parse one VEVENT. `None` if DTSTART is missing or unreadable.
fn parse_event(vevent: &Component) -> Option<Event> {
    let start = parse_time(vevent.find_prop("DTSTART")?)?;
    let end = vevent.find_prop("DTEND").and_then(parse_time);
    let duration = vevent
        .find_prop("DURATION")
        .and_then(|p| parse_duration(p.val.as_ref()));

    let uid = vevent.find_prop("UID").map(|p| p.val.to_string());
    let summary = vevent.find_prop("SUMMARY").map(|p| p.val.to_string());

    // Recurrence (RRULE, RDATE, EXDATE); additional RRULEs are not supported.
    let recurrence = Recurrence {
        rrule: vevent.find_prop("RRULE").map(|p| p.val.to_string()),
        rdates: collect_time_lists(vevent, "RDATE"),
        exdates: collect_time_lists(vevent, "EXDATE"),
    };

    Some(Event {
        uid,
        summary,
        occurrence: Occurrence {
            start,
            end,
            duration,
        },
        recurrence: (!recurrence.is_empty()).then_some(recurrence),
    })
}

fn parse_time(prop: &Property) -> Option<EventTime> {
    DatePerhapsTime::try_from(prop).ok().map(to_event_time)
}

/// Convert icalendar's DatePerhapsTime to our EventTime, preserving timezone info
fn to_event_time(dpt: DatePerhapsTime) -> EventTime {
    match dpt {
        DatePerhapsTime::Date(d) => EventTime::Date(d),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            CalendarDateTime::Utc(dt) => EventTime::DateTimeUtc(dt),
            CalendarDateTime::Floating(naive) => EventTime::DateTimeFloating(naive),
            CalendarDateTime::WithTimezone { date_time, tzid } => EventTime::DateTimeZoned {
                datetime: date_time,
                tzid,
            },
        },
    }
}

fn collect_time_lists(component: &Component, name: &str) -> Vec<EventTime> {
    component
        .properties
        .iter()
        .filter(|p| p.name == name)
        .flat_map(parse_time_list)
        .collect()
}

/// Parse an RDATE or EXDATE property into a list of EventTime values.
///
/// Handles:
/// - TZID parameter: `EXDATE;TZID=America/New_York:20240108T100000`
/// - VALUE=DATE: `EXDATE;VALUE=DATE:20240108`
/// - UTC: `EXDATE:20240108T100000Z`
/// - Floating: `EXDATE:20240108T100000`
/// - Comma-separated values: `EXDATE;TZID=...:20240108T100000,20240115T100000`
/// - RDATE periods (`start/end` or `start/duration`), of which only the start is used
fn parse_time_list(prop: &Property) -> Vec<EventTime> {
    let tzid = param(prop, "TZID").map(str::to_string);
    let is_date = param(prop, "VALUE") == Some("DATE");

    prop.val
        .as_ref()
        .split(',')
        .filter_map(|s| {
            let s = s.trim();
            let s = s.split_once('/').map_or(s, |(start, _)| start);
            if s.is_empty() {
                return None;
            }

            if is_date {
                NaiveDate::parse_from_str(s, "%Y%m%d")
                    .ok()
                    .map(EventTime::Date)
            } else if let Some(stripped) = s.strip_suffix('Z') {
                parse_naive(stripped).map(|dt| EventTime::DateTimeUtc(dt.and_utc()))
            } else if let Some(ref tz) = tzid {
                parse_naive(s).map(|dt| EventTime::DateTimeZoned {
                    datetime: dt,
                    tzid: tz.clone(),
                })
            } else {
                parse_naive(s).map(EventTime::DateTimeFloating)
            }
        })
        .collect()
}

fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S").ok()
}

fn param<'a>(prop: &'a Property, key: &str) -> Option<&'a str> {
    prop.params
        .iter()
        .find(|p| p.key == key)
        .and_then(|p| p.val.as_ref())
        .map(|v| v.as_ref())
}

/// Parse an RFC 5545 DURATION value (`PT1H30M`, `P1D`, `-PT15M`, `P2W`).
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (negative, unsigned) = match value.as_bytes().first()? {
        b'-' => (true, &value[1..]),
        b'+' => (false, &value[1..]),
        _ => (false, value),
    };

    let duration = iso8601::duration(unsigned).ok()?;
    let std_duration: std::time::Duration = duration.into();
    let duration = Duration::from_std(std_duration).ok()?;

    Some(if negative { -duration } else { duration })
}

/// Parse a VTIMEZONE component. `None` if it has no TZID.
fn parse_vtimezone(component: &Component) -> Option<VTimezone> {
    let tzid = component.find_prop("TZID")?.val.to_string();

    let observances = component
        .components
        .iter()
        .filter_map(|child| {
            let kind = match child.name.as_ref() {
                "STANDARD" => ObservanceKind::Standard,
                "DAYLIGHT" => ObservanceKind::Daylight,
                _ => return None,
            };
            let observance = parse_observance(child, kind);
            if observance.is_none() {
                tracing::warn!(tzid = %tzid, ?kind, "Ignoring incomplete timezone observance");
            }
            observance
        })
        .collect();

    Some(VTimezone { tzid, observances })
}

fn parse_observance(component: &Component, kind: ObservanceKind) -> Option<Observance> {
    let dtstart = parse_time(component.find_prop("DTSTART")?)?.local();
    let offset_from = parse_utc_offset(component.find_prop("TZOFFSETFROM")?.val.as_ref())?;
    let offset_to = parse_utc_offset(component.find_prop("TZOFFSETTO")?.val.as_ref())?;
    let rrule = component.find_prop("RRULE").map(|p| p.val.as_ref());
    let rdates = collect_time_lists(component, "RDATE")
        .iter()
        .map(EventTime::local)
        .collect();
    let name = component.find_prop("TZNAME").map(|p| p.val.to_string());

    Some(Observance::new(kind, dtstart, offset_from, offset_to, rrule, rdates).with_name(name))
}

/// Make every TZID used by an event resolvable: zones without a VTIMEZONE are
/// looked up in the IANA database.
fn register_named_timezones(calendar: &mut Calendar) {
    let tzids: Vec<String> = calendar
        .events
        .iter()
        .flat_map(|event| {
            let occurrence = &event.occurrence;
            let recurrence = event
                .recurrence
                .iter()
                .flat_map(|r| r.rdates.iter().chain(&r.exdates));
            std::iter::once(&occurrence.start)
                .chain(occurrence.end.as_ref())
                .chain(recurrence)
        })
        .filter_map(|time| time.tzid().map(str::to_string))
        .collect();

    for tzid in tzids {
        if calendar.timezone(&tzid).is_some() {
            continue;
        }
        match chrono_tz::Tz::from_str(&tzid) {
            Ok(tz) => calendar.add_timezone(Timezone::Named(tz)),
            Err(_) => tracing::warn!(tzid = %tzid, "Unknown TZID, using the calendar default"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn naive(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_single_event() {
        let ics = r#"BEGIN:VCALENDAR
VERSION:2.0
PRODID:TEST
BEGIN:VEVENT
UID:test-123
SUMMARY:Heater
DTSTART:20240101T100000Z
DTEND:20240101T110000Z
END:VEVENT
END:VCALENDAR"#;

        let calendar = parse_calendar(ics).expect("Should parse");
        assert_eq!(calendar.events.len(), 1);
        assert!(calendar.timezones.is_empty());

        let event = &calendar.events[0];
        assert_eq!(event.uid.as_deref(), Some("test-123"));
        assert_eq!(event.summary.as_deref(), Some("Heater"));
        assert_eq!(
            event.occurrence.start,
            EventTime::DateTimeUtc(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap())
        );
        assert!(event.occurrence.duration.is_none());
        assert!(event.recurrence.is_none());
    }

    #[test]
    fn test_parse_duration_and_missing_dtstart() {
        let ics = r#"BEGIN:VCALENDAR
VERSION:2.0
PRODID:TEST
BEGIN:VEVENT
UID:no-start
DTEND:20240101T110000Z
END:VEVENT
BEGIN:VEVENT
UID:with-duration
DTSTART:20240101T100000
DURATION:PT1H30M
END:VEVENT
END:VCALENDAR"#;

        let calendar = parse_calendar(ics).expect("Should parse");
        assert_eq!(calendar.events.len(), 1, "Event without DTSTART is dropped");

        let event = &calendar.events[0];
        assert_eq!(
            event.occurrence.start,
            EventTime::DateTimeFloating(naive(2024, 1, 1, 10, 0))
        );
        assert_eq!(event.occurrence.end, None);
        assert_eq!(event.occurrence.duration, Some(Duration::minutes(90)));
    }

    #[test]
    fn test_parse_duration_values() {
        assert_eq!(parse_duration("PT15M"), Some(Duration::minutes(15)));
        assert_eq!(parse_duration("-PT15M"), Some(Duration::minutes(-15)));
        assert_eq!(parse_duration("P1D"), Some(Duration::days(1)));
        assert_eq!(parse_duration("P1DT2H"), Some(Duration::hours(26)));
        assert_eq!(parse_duration("P2W"), Some(Duration::weeks(2)));
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn test_parse_recurrence_lists() {
        let ics = r#"BEGIN:VCALENDAR
VERSION:2.0
PRODID:TEST
BEGIN:VEVENT
UID:test-123
SUMMARY:Recurring Event
DTSTART;TZID=America/New_York:20240101T100000
DTEND;TZID=America/New_York:20240101T110000
RRULE:FREQ=WEEKLY;BYDAY=MO
RDATE;VALUE=DATE:20240103
RDATE:20240104T100000Z/PT1H
EXDATE;TZID=America/New_York:20240108T100000,20240115T100000
EXDATE:20240122T150000Z
END:VEVENT
END:VCALENDAR"#;

        let calendar = parse_calendar(ics).expect("Should parse");
        let recurrence = calendar.events[0]
            .recurrence
            .clone()
            .expect("Should have recurrence");

        assert_eq!(recurrence.rrule.as_deref(), Some("FREQ=WEEKLY;BYDAY=MO"));
        assert_eq!(
            recurrence.rdates,
            vec![
                EventTime::Date(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()),
                EventTime::DateTimeUtc(Utc.with_ymd_and_hms(2024, 1, 4, 10, 0, 0).unwrap()),
            ]
        );
        assert_eq!(recurrence.exdates.len(), 3);
        for exdate in &recurrence.exdates[..2] {
            assert_eq!(exdate.tzid(), Some("America/New_York"));
        }
        assert!(recurrence.exdates[2].is_utc());

        // No VTIMEZONE, so the TZID resolves through the IANA database.
        assert!(matches!(
            calendar.timezone("America/New_York"),
            Some(Timezone::Named(_))
        ));
    }

    #[test]
    fn test_parse_vtimezone() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:TEST\r\n\
BEGIN:VTIMEZONE\r\n\
TZID:Custom/Eastern\r\n\
BEGIN:STANDARD\r\n\
DTSTART:19701101T020000\r\n\
TZOFFSETFROM:-0400\r\n\
TZOFFSETTO:-0500\r\n\
RRULE:FREQ=YEARLY;BYMONTH=11;BYDAY=1SU\r\n\
TZNAME:EST\r\n\
END:STANDARD\r\n\
BEGIN:DAYLIGHT\r\n\
DTSTART:19700308T020000\r\n\
TZOFFSETFROM:-0500\r\n\
TZOFFSETTO:-0400\r\n\
RRULE:FREQ=YEARLY;BYMONTH=3;BYDAY=2SU\r\n\
TZNAME:EDT\r\n\
END:DAYLIGHT\r\n\
END:VTIMEZONE\r\n\
BEGIN:VEVENT\r\n\
UID:zoned\r\n\
DTSTART;TZID=Custom/Eastern:20240701T090000\r\n\
DTEND;TZID=Custom/Eastern:20240701T100000\r\n\
END:VEVENT\r\n\
END:VCALENDAR";

        let calendar = parse_calendar(ics).expect("Should parse");
        assert_eq!(calendar.default_tzid.as_deref(), Some("Custom/Eastern"));

        let Some(Timezone::Defined(vtz)) = calendar.timezone("Custom/Eastern") else {
            panic!("Expected inline VTIMEZONE");
        };
        assert_eq!(vtz.observances.len(), 2);
        assert_eq!(vtz.observances[0].name.as_deref(), Some("EST"));
        assert_eq!(vtz.offset_at(naive(2024, 7, 1, 9, 0)), Some(-4 * 3600));
        assert_eq!(vtz.offset_at(naive(2024, 12, 1, 9, 0)), Some(-5 * 3600));
    }

    #[test]
    fn test_x_wr_timezone_fallback() {
        let ics = r#"BEGIN:VCALENDAR
VERSION:2.0
PRODID:TEST
X-WR-TIMEZONE:Europe/Berlin
BEGIN:VEVENT
UID:floating
DTSTART:20240101T100000
DTEND:20240101T110000
END:VEVENT
END:VCALENDAR"#;

        let calendar = parse_calendar(ics).expect("Should parse");
        assert_eq!(calendar.default_tzid.as_deref(), Some("Europe/Berlin"));
        assert!(calendar.default_timezone().is_some());
    }

    #[test]
    fn test_parse_line_folding_in_rrule() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:TEST\r\n\
BEGIN:VEVENT\r\n\
UID:folded\r\n\
DTSTART:20240101T100000Z\r\n\
DURATION:PT1H\r\n\
RRULE:FREQ=WEEKLY;\r\n BYDAY=MO,WE\r\n\
END:VEVENT\r\n\
END:VCALENDAR";

        let calendar = parse_calendar(ics).expect("Should parse");
        let recurrence = calendar.events[0].recurrence.as_ref().unwrap();
        assert_eq!(recurrence.rrule.as_deref(), Some("FREQ=WEEKLY;BYDAY=MO,WE"));
    }
}
