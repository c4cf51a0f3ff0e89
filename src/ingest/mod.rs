//! Ingestion Loop
//!
//! Pulls events one at a time and drives each through validation, the
//! log-plus-aggregate transaction and an optional report. Per-event failures
//! never escape the loop; it ends only on cancellation, source exhaustion or
//! an unrecoverable source failure.
//!
//! The source is pumped by its own task into a capacity-1 channel. Receiving
//! from that channel is the only point where the loop waits, and cancellation
//! is observed there, so an in-flight event always completes.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::config::Config;
use crate::domain::RawEvent;
use crate::handlers::EventHandler;
use crate::jobs;
use crate::projection::AuthorAggregateStore;
use crate::report::ReportingView;
use crate::source::{EventSource, SourceError};

/// Loop tuning
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Log the reporting view after each persisted event
    pub report_every_event: bool,
    /// Backoff unit when storage is unavailable
    pub retry_delay: Duration,
    /// Retries before an event is dropped
    pub max_storage_retries: u32,
    /// Periodic repair cadence, if any
    pub repair_interval: Option<Duration>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            report_every_event: true,
            retry_delay: Duration::from_secs(1),
            max_storage_retries: 3,
            repair_interval: None,
        }
    }
}

impl From<&Config> for IngestConfig {
    fn from(config: &Config) -> Self {
        Self {
            report_every_event: config.report_every_event,
            retry_delay: config.retry_delay,
            max_storage_retries: config.max_storage_retries,
            repair_interval: config.repair_interval,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    WaitingForEvent,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Shutdown was requested
    Cancelled,
    /// The source has no more events
    SourceExhausted,
}

/// Counters kept by the loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub received: u64,
    pub persisted: u64,
    /// Malformed or undecodable records
    pub rejected: u64,
    /// Valid events that could not be stored
    pub dropped: u64,
    pub retries: u64,
    pub repair_passes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub stop_reason: StopReason,
    pub stats: IngestStats,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Event source failed: {source}")]
    Source {
        #[source]
        source: SourceError,
        stats: IngestStats,
    },
}

/// Single-consumer ingestion loop
pub struct IngestionLoop {
    handler: EventHandler,
    store: AuthorAggregateStore,
    report: ReportingView,
    config: IngestConfig,
    state: LoopState,
    stats: IngestStats,
}

impl IngestionLoop {
    pub fn new(handler: EventHandler, store: AuthorAggregateStore, config: IngestConfig) -> Self {
        Self {
            handler,
            report: ReportingView::new(store.clone()),
            store,
            config,
            state: LoopState::WaitingForEvent,
            stats: IngestStats::default(),
        }
    }

    /// Consume `source` until it is exhausted, fails, or `shutdown` resolves
    pub async fn run<S, F>(mut self, source: S, shutdown: F) -> Result<IngestSummary, IngestError>
    where
        S: EventSource + 'static,
        F: Future<Output = ()>,
    {
        let (tx, mut rx) = mpsc::channel(1);
        let pump = tokio::spawn(pump_source(source, tx));

        tokio::pin!(shutdown);
        let mut repair_timer = self.config.repair_interval.map(|period| {
            let mut timer = tokio::time::interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });

        tracing::info!("Starting consumer loop...");

        let outcome = loop {
            self.transition(LoopState::WaitingForEvent);

            tokio::select! {
                biased;

                _ = &mut shutdown => break Ok(StopReason::Cancelled),

                _ = next_tick(&mut repair_timer) => {
                    self.stats.repair_passes += 1;
                    jobs::repair_all_authors(&self.store).await;
                }

                item = rx.recv() => match item {
                    None => break Ok(StopReason::SourceExhausted),
                    Some(Ok(raw)) => self.process(raw).await,
                    Some(Err(e)) if e.is_recoverable() => {
                        self.stats.rejected += 1;
                        tracing::warn!(error = %e, "Skipping undecodable record");
                    }
                    Some(Err(e)) => break Err(e),
                },
            }
        };

        pump.abort();
        self.transition(LoopState::WaitingForEvent);

        match outcome {
            Ok(stop_reason) => {
                tracing::info!(?stop_reason, stats = ?self.stats, "Consumer loop stopped");
                Ok(IngestSummary {
                    stop_reason,
                    stats: self.stats,
                })
            }
            Err(source) => {
                tracing::error!(error = %source, stats = ?self.stats, "Event source failed");
                Err(IngestError::Source {
                    source,
                    stats: self.stats,
                })
            }
        }
    }

    fn transition(&mut self, next: LoopState) {
        if self.state != next {
            tracing::trace!(from = ?self.state, to = ?next, "Loop state changed");
            self.state = next;
        }
    }

    /// Process one event to completion. Never returns an error.
    async fn process(&mut self, raw: RawEvent) {
        self.transition(LoopState::Processing);
        self.stats.received += 1;

        tracing::info!(
            author = raw.author.as_deref().unwrap_or("<missing>"),
            sentiment = ?raw.sentiment,
            "Received message"
        );

        let event = match self.handler.validate(raw) {
            Ok(event) => event,
            Err(e) => {
                self.stats.rejected += 1;
                tracing::warn!(field = e.field(), error = %e, "Rejected malformed event");
                return;
            }
        };

        let mut attempt = 0;
        loop {
            match self.handler.persist(&event).await {
                Ok(result) => {
                    self.stats.persisted += 1;
                    tracing::info!(
                        event_id = result.event_id,
                        author = %result.aggregate.author,
                        average_sentiment = result.aggregate.average_sentiment,
                        event_count = result.aggregate.event_count,
                        "Event ingested"
                    );
                    break;
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_storage_retries => {
                    attempt += 1;
                    self.stats.retries += 1;
                    tracing::warn!(
                        attempt,
                        max_retries = self.config.max_storage_retries,
                        error = %e,
                        "Storage unavailable, retrying event"
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(e) => {
                    self.stats.dropped += 1;
                    tracing::error!(
                        author = %event.author,
                        error = %e,
                        "Event dropped; log and aggregate left unchanged"
                    );
                    return;
                }
            }
        }

        if self.config.report_every_event {
            if let Err(e) = self.report.render_summary().await {
                tracing::warn!(error = %e, "Failed to render summary");
            }
        }
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Forward events from `source` into `tx` until exhaustion or a fatal error
async fn pump_source<S: EventSource>(
    mut source: S,
    tx: mpsc::Sender<Result<RawEvent, SourceError>>,
) {
    loop {
        let item = match source.next_event().await {
            Ok(Some(event)) => Ok(event),
            Ok(None) => break,
            Err(e) => Err(e),
        };

        let fatal = matches!(&item, Err(e) if !e.is_recoverable());
        if tx.send(item).await.is_err() || fatal {
            break;
        }
    }
}
