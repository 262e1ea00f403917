//! Schedule engine for onoff.
//!
//! Turns a parsed iCalendar document into a flat list of on/off UTC intervals:
//! - `ics` parses calendar text into the [`Calendar`] model
//! - `timezone` resolves local wall-clock times to UTC offsets
//! - `normalize` and `liveness` decide what a single occurrence looks like and whether it is over
//! - `recurrence` expands recurring events under per-event and global caps
//! - `schedule` drives the whole build and renders the output lines

pub mod config;
pub mod error;
pub mod event;
pub mod ics;
pub mod liveness;
pub mod normalize;
pub mod recurrence;
mod rule;
pub mod schedule;
pub mod timezone;

pub use config::{Limits, OnOffConfig};
pub use error::{OnOffError, OnOffResult};
pub use event::*;
pub use schedule::{Interval, Schedule, build_schedule};
