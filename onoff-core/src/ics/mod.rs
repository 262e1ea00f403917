//! ICS file parsing.
//!
//! Reads RFC 5545 text into the [`Calendar`](crate::event::Calendar) model.

mod parse;

pub use parse::{parse_calendar, parse_duration};
