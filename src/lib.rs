//! sentiment_stream Library
//!
//! Streaming consumer that keeps a durable log of author-tagged sentiment
//! events and an incrementally maintained per-author aggregate.

pub mod aggregate;
pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod event_store;
pub mod handlers;
pub mod ingest;
pub mod jobs;
pub mod projection;
pub mod report;
pub mod source;

mod error;

pub use aggregate::AuthorAggregate;
pub use config::{Config, EventSourceKind};
pub use domain::{MalformedEvent, NewEvent, RawEvent, StoredEvent};
pub use error::{AppError, AppResult};
