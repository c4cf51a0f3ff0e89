//! Projection module
//!
//! The author aggregate read model derived from the event log.

mod service;

pub use service::{AuthorAggregateStore, RepairOutcome};
