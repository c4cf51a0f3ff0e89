//! Author Aggregate
//!
//! Running mean sentiment and event count for one author.

use serde::{Deserialize, Serialize};

/// Tolerance used when comparing a stored mean against a scan-based mean
pub const MEAN_TOLERANCE: f64 = 1e-9;

/// Per-author running statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorAggregate {
    pub author: String,
    pub average_sentiment: f64,
    pub event_count: i64,
}

impl AuthorAggregate {
    /// State after the first event for an author
    pub fn first(author: impl Into<String>, sentiment: f64) -> Self {
        Self {
            author: author.into(),
            average_sentiment: sentiment,
            event_count: 1,
        }
    }

    /// Fold one more sentiment into the running mean in O(1).
    ///
    /// `avg_new = (avg_old * count_old + s) / (count_old + 1)`
    pub fn apply(self, sentiment: f64) -> Self {
        let count = self.event_count + 1;
        let average = (self.average_sentiment * self.event_count as f64 + sentiment) / count as f64;
        Self {
            author: self.author,
            average_sentiment: average,
            event_count: count,
        }
    }

    /// Fold a sentiment into an optional previous state
    pub fn fold(previous: Option<Self>, author: &str, sentiment: f64) -> Self {
        match previous {
            Some(aggregate) => aggregate.apply(sentiment),
            None => Self::first(author, sentiment),
        }
    }

    /// Same count and a mean within [`MEAN_TOLERANCE`]
    pub fn matches(&self, other: &Self) -> bool {
        self.author == other.author
            && self.event_count == other.event_count
            && (self.average_sentiment - other.average_sentiment).abs() <= MEAN_TOLERANCE
    }
}
