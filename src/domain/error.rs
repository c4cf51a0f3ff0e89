//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;

/// An event that cannot be accepted into the log.
///
/// Raised before any write; the ingestion loop logs it and moves on.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MalformedEvent {
    /// A required field was absent from the record
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Author present but blank
    #[error("Author must not be empty")]
    EmptyAuthor,

    /// NaN or infinite sentiment would poison the running mean
    #[error("Sentiment must be a finite number")]
    NonFiniteSentiment,

    #[error("Sentiment {0} is outside [0.0, 1.0]")]
    SentimentOutOfRange(f64),

    #[error("Message length must be non-negative, got {0}")]
    NegativeMessageLength(i64),
}

impl MalformedEvent {
    /// Name of the offending field, for structured logs
    pub fn field(&self) -> &'static str {
        match self {
            MalformedEvent::MissingField(field) => field,
            MalformedEvent::EmptyAuthor => "author",
            MalformedEvent::NonFiniteSentiment | MalformedEvent::SentimentOutOfRange(_) => {
                "sentiment"
            }
            MalformedEvent::NegativeMessageLength(_) => "message_length",
        }
    }
}
