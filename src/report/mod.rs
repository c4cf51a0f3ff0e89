//! Reporting View
//!
//! Read-only projection of the author aggregate store, ordered by mean
//! sentiment descending and author ascending.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate::AuthorAggregate;
use crate::event_store::StoreError;
use crate::projection::AuthorAggregateStore;

/// Snapshot of every author's aggregate
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub authors: Vec<AuthorAggregate>,
    pub generated_at: DateTime<Utc>,
}

impl Summary {
    pub fn is_empty(&self) -> bool {
        self.authors.is_empty()
    }

    /// Author names in report order
    pub fn order(&self) -> Vec<&str> {
        self.authors.iter().map(|a| a.author.as_str()).collect()
    }

    /// Emit the summary to the log, one line per author
    pub fn log(&self) {
        tracing::info!("--- Average Sentiment by Author ---");
        if self.authors.is_empty() {
            tracing::info!("No messages found in the database.");
        }
        for agg in &self.authors {
            tracing::info!(
                author = %agg.author,
                average_sentiment = agg.average_sentiment,
                event_count = agg.event_count,
                "{}",
                format_row(agg)
            );
        }
        tracing::info!("-----------------------------------");
    }
}

fn format_row(agg: &AuthorAggregate) -> String {
    format!(
        "Author: {:<10} | Avg Sentiment: {:.2} | Events: {}",
        agg.author, agg.average_sentiment, agg.event_count
    )
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.authors.is_empty() {
            return writeln!(f, "No messages found in the database.");
        }
        for agg in &self.authors {
            writeln!(f, "{}", format_row(agg))?;
        }
        Ok(())
    }
}

/// Renders summaries from the aggregate store
#[derive(Debug, Clone)]
pub struct ReportingView {
    store: AuthorAggregateStore,
}

impl ReportingView {
    pub fn new(store: AuthorAggregateStore) -> Self {
        Self { store }
    }

    /// Read the current aggregates. No side effects.
    pub async fn snapshot(&self) -> Result<Summary, StoreError> {
        Ok(Summary {
            authors: self.store.list_all_ordered().await?,
            generated_at: Utc::now(),
        })
    }

    /// Read the current aggregates and emit them to the log
    pub async fn render_summary(&self) -> Result<Summary, StoreError> {
        let summary = self.snapshot().await?;
        summary.log();
        Ok(summary)
    }
}
