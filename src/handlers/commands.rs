//! Command results
//!
//! Outcomes returned by the handlers.

use serde::Serialize;

use crate::aggregate::AuthorAggregate;
use crate::domain::StoredEvent;
use crate::projection::RepairOutcome;

/// Result of ingesting one event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestResult {
    /// Id assigned by the event log
    pub event_id: i64,
    /// Author aggregate after folding the event in
    pub aggregate: AuthorAggregate,
}

/// Result of an administrative delete
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteEventResult {
    pub event: StoredEvent,
    /// The author's aggregate recomputed without the deleted event
    pub repair: RepairOutcome,
}
