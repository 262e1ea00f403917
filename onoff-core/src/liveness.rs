//! Decides whether an occurrence is already over.

use crate::event::{Calendar, Occurrence};
use crate::normalize::normalize;

/// True when the occurrence should be discarded.
///
/// That is the case when its UTC end is before `reference`, when it has neither
/// an end nor a duration, or when `reference` is not a positive epoch time. The
/// end is resolved in its own timezone, not the start's.
pub fn is_done(calendar: &Calendar, occurrence: &Occurrence, reference: i64) -> bool {
    if reference <= 0 {
        return true;
    }

    match normalize(occurrence) {
        Some(normalized) => calendar.to_unix(&normalized.end) < reference,
        None => true,
    }
}
