//! Demo source
//!
//! Emits a synthetic event every interval, rotating over three authors with
//! sentiment cycling 0.0 → 0.9.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::RawEvent;

use super::{EventSource, SourceError};

const AUTHORS: [&str; 3] = ["Alice", "Bob", "Charlie"];

pub struct DemoSource {
    sequence: u64,
    interval: Duration,
    max_events: Option<u64>,
}

impl DemoSource {
    /// `max_events` of zero means unlimited
    pub fn new(interval: Duration, max_events: u64) -> Self {
        Self {
            sequence: 0,
            interval,
            max_events: (max_events > 0).then_some(max_events),
        }
    }

    /// The `n`th demo event, without any delay
    pub fn event_at(n: u64) -> RawEvent {
        let message = format!("Streaming message {n}");
        RawEvent {
            message_length: Some(message.chars().count() as i64),
            message: Some(message),
            author: Some(AUTHORS[(n % AUTHORS.len() as u64) as usize].to_string()),
            timestamp: Some(chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()),
            category: Some("demo".to_string()),
            sentiment: Some((n % 10) as f64 / 10.0),
            keyword_mentioned: Some("demo".to_string()),
        }
    }
}

#[async_trait]
impl EventSource for DemoSource {
    async fn next_event(&mut self) -> Result<Option<RawEvent>, SourceError> {
        if self.max_events.is_some_and(|max| self.sequence >= max) {
            return Ok(None);
        }
        if self.sequence > 0 && !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }

        let event = Self::event_at(self.sequence);
        self.sequence += 1;
        Ok(Some(event))
    }
}
