//! Error types for the onoff ecosystem.

use thiserror::Error;

/// Errors raised by the collaborators around the schedule engine.
///
/// The engine itself never fails on a single event: bad events are skipped.
#[derive(Error, Debug)]
pub enum OnOffError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("Recurrence error: {0}")]
    Recurrence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for onoff operations.
pub type OnOffResult<T> = Result<T, OnOffError>;
