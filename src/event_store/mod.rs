//! Event Store module
//!
//! The durable, append-only event log backed by SQLite.

mod error;
mod repository;

pub use error::{with_timeout, StoreError};
pub use repository::EventLog;
