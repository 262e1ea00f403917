//! Turns an occurrence into a concrete local start/end pair.

use crate::event::{EventTime, Occurrence};

/// An occurrence with both ends known, still in local time.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedOccurrence {
    pub start: EventTime,
    pub end: EventTime,
}

/// Keep an explicit end, otherwise derive `end = start + duration`.
///
/// Returns `None` when the occurrence has neither an end nor a duration
/// (or the derived end overflows).
pub fn normalize(occurrence: &Occurrence) -> Option<NormalizedOccurrence> {
    let end = match (&occurrence.end, occurrence.duration) {
        (Some(end), _) => end.clone(),
        (None, Some(duration)) => occurrence.start.checked_add(duration)?,
        (None, None) => return None,
    };

    Some(NormalizedOccurrence {
        start: occurrence.start.clone(),
        end,
    })
}
