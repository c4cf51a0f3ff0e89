//! Domain Events
//!
//! Event records as they arrive from a source, once validated, and once stored.
//! Stored events are immutable facts; the log only ever grows during ingestion.

use serde::{Deserialize, Serialize};

use super::MalformedEvent;

/// An event exactly as delivered by a source.
///
/// Every field is optional so that a record with a missing field can still be
/// decoded and then rejected with a precise [`MalformedEvent`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub message: Option<String>,
    pub author: Option<String>,
    pub timestamp: Option<String>,
    pub category: Option<String>,
    pub sentiment: Option<f64>,
    pub keyword_mentioned: Option<String>,
    pub message_length: Option<i64>,
}

/// Validation rules applied before anything is written
#[derive(Debug, Clone, Copy)]
pub struct ValidationPolicy {
    /// Reject sentiment scores outside [0.0, 1.0]
    pub enforce_sentiment_range: bool,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            enforce_sentiment_range: true,
        }
    }
}

impl RawEvent {
    /// Validate into a [`NewEvent`] ready to be appended.
    ///
    /// `message_length` is trusted when supplied and derived from the message
    /// (in characters) when absent.
    pub fn validate(self, policy: &ValidationPolicy) -> Result<NewEvent, MalformedEvent> {
        let author = self.author.ok_or(MalformedEvent::MissingField("author"))?;
        if author.trim().is_empty() {
            return Err(MalformedEvent::EmptyAuthor);
        }

        let sentiment = self
            .sentiment
            .ok_or(MalformedEvent::MissingField("sentiment"))?;
        if !sentiment.is_finite() {
            return Err(MalformedEvent::NonFiniteSentiment);
        }
        if policy.enforce_sentiment_range && !(0.0..=1.0).contains(&sentiment) {
            return Err(MalformedEvent::SentimentOutOfRange(sentiment));
        }

        let message = self.message.ok_or(MalformedEvent::MissingField("message"))?;
        let timestamp = self
            .timestamp
            .ok_or(MalformedEvent::MissingField("timestamp"))?;

        let message_length = match self.message_length {
            Some(len) if len < 0 => return Err(MalformedEvent::NegativeMessageLength(len)),
            Some(len) => len,
            None => message.chars().count() as i64,
        };

        Ok(NewEvent {
            message,
            author,
            timestamp,
            category: self.category.unwrap_or_default(),
            sentiment,
            keyword_mentioned: self.keyword_mentioned.unwrap_or_default(),
            message_length,
        })
    }
}

/// A validated event that has not been assigned an id yet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEvent {
    pub message: String,
    pub author: String,
    pub timestamp: String,
    pub category: String,
    pub sentiment: f64,
    pub keyword_mentioned: String,
    pub message_length: i64,
}

impl NewEvent {
    /// Attach the id assigned by the log
    pub fn stored(self, id: i64) -> StoredEvent {
        StoredEvent {
            id,
            message: self.message,
            author: self.author,
            timestamp: self.timestamp,
            category: self.category,
            sentiment: self.sentiment,
            keyword_mentioned: self.keyword_mentioned,
            message_length: self.message_length,
        }
    }
}

/// Event read back from the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: i64,
    pub message: String,
    pub author: String,
    pub timestamp: String,
    pub category: String,
    pub sentiment: f64,
    pub keyword_mentioned: String,
    pub message_length: i64,
}
