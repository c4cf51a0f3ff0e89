//! Event sources
//!
//! The ingestion loop pulls events one at a time through [`EventSource`].
//! Concrete transports are adapters behind that trait.

mod demo;
mod json_lines;

use std::collections::VecDeque;

use async_trait::async_trait;

use crate::domain::RawEvent;

pub use demo::DemoSource;
pub use json_lines::JsonLinesSource;

/// Errors raised while pulling from a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The transport failed; no more events can be pulled
    #[error("Event source unreachable: {0}")]
    Unreachable(#[from] std::io::Error),

    /// One record could not be decoded; the source itself is still usable
    #[error("Undecodable record at line {line}: {source}")]
    Decode {
        line: u64,
        #[source]
        source: serde_json::Error,
    },
}

impl SourceError {
    /// Whether pulling may continue after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SourceError::Decode { .. })
    }
}

/// A lazy, possibly infinite sequence of events.
///
/// `next_event` may wait indefinitely. `Ok(None)` means the source is
/// exhausted.
#[async_trait]
pub trait EventSource: Send {
    async fn next_event(&mut self) -> Result<Option<RawEvent>, SourceError>;
}

/// Source over a fixed list of events
#[derive(Debug, Clone, Default)]
pub struct IterSource {
    events: VecDeque<RawEvent>,
}

impl IterSource {
    pub fn new(events: impl IntoIterator<Item = RawEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
        }
    }
}

#[async_trait]
impl EventSource for IterSource {
    async fn next_event(&mut self) -> Result<Option<RawEvent>, SourceError> {
        Ok(self.events.pop_front())
    }
}
