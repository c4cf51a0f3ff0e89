//! Scheduled Jobs
//!
//! Periodic maintenance run by the ingestion loop between events.

use chrono::{DateTime, Utc};

use crate::projection::{AuthorAggregateStore, RepairOutcome};

/// Report from a repair pass over every author
#[derive(Debug, Clone, Default)]
pub struct RepairReport {
    pub authors_checked: usize,
    pub authors_repaired: usize,
    /// Outcomes whose stored row disagreed with the log
    pub drifted: Vec<RepairOutcome>,
    pub errors: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

impl RepairReport {
    fn from_outcomes(outcomes: Vec<RepairOutcome>) -> Self {
        let authors_checked = outcomes.len();
        let drifted: Vec<RepairOutcome> = outcomes.into_iter().filter(|o| o.drifted()).collect();

        Self {
            authors_checked,
            authors_repaired: drifted.len(),
            drifted,
            errors: Vec::new(),
            completed_at: Utc::now(),
        }
    }
}

/// Recompute every author's aggregate from the event log
pub async fn repair_all_authors(store: &AuthorAggregateStore) -> RepairReport {
    let report = match store.repair_all().await {
        Ok(outcomes) => RepairReport::from_outcomes(outcomes),
        Err(e) => RepairReport {
            errors: vec![format!("Repair pass: {}", e)],
            completed_at: Utc::now(),
            ..RepairReport::default()
        },
    };

    if !report.errors.is_empty() {
        tracing::error!(errors = ?report.errors, "Repair pass failed");
    } else if report.authors_repaired > 0 {
        tracing::warn!(
            authors_checked = report.authors_checked,
            authors_repaired = report.authors_repaired,
            "Repair pass corrected drifted aggregates"
        );
    } else {
        tracing::info!(
            authors_checked = report.authors_checked,
            "Repair pass found no drift"
        );
    }

    report
}

// =========================================================================
// Tests
// =========================================================================
