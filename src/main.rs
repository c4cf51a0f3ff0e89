//! sentiment_stream - streaming sentiment consumer
//!
//! Reads one event at a time, appends it to a SQLite event log and keeps a
//! running per-author sentiment average alongside it.

use std::net::SocketAddr;

use axum::{middleware, Router};
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sentiment_stream::config::{Config, EventSourceKind};
use sentiment_stream::event_store::EventLog;
use sentiment_stream::handlers::{AdminHandler, EventHandler};
use sentiment_stream::ingest::{IngestConfig, IngestionLoop};
use sentiment_stream::projection::AuthorAggregateStore;
use sentiment_stream::report::ReportingView;
use sentiment_stream::source::{DemoSource, JsonLinesSource};
use sentiment_stream::{api, db, jobs};

#[derive(Parser, Debug)]
#[command(name = "sentiment_stream")]
#[command(about = "Streaming sentiment consumer with per-author running averages")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Consume events from the configured source (default)
    Run,
    /// Print the current per-author summary
    Report,
    /// Recompute aggregates from the event log
    Repair {
        /// Only repair this author
        #[arg(long)]
        author: Option<String>,
    },
    /// Compare one author's aggregate with the event log, without writing
    Verify {
        #[arg(long)]
        author: String,
    },
    /// Delete one event and recompute its author's aggregate
    DeleteEvent {
        id: i64,
    },
    /// Drop and recreate all tables
    Reset {
        /// Confirm that all stored data should be destroyed
        #[arg(long)]
        yes: bool,
    },
}

/// Initialize tracing/logging, as JSON lines in production
fn init_tracing(json: bool) {
    let registry = tracing_subscriber::registry().with(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "sentiment_stream=debug,tower_http=debug".into()),
    );

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Build the reporting router
fn build_router(pool: SqlitePool) -> Router {
    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api/v1", api::create_router())
        .layer(middleware::from_fn(api::middleware::logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(pool)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(config.is_production());

    tracing::info!(database_url = %config.database_url, "Opening database...");
    let pool = db::connect(
        &config.database_url,
        config.database_max_connections,
        config.storage_timeout,
    )
    .await?;
    db::verify_connection(&pool).await?;

    let status = db::check_schema(&pool).await?;
    if !status.is_complete() {
        tracing::info!(
            events = status.events,
            author_aggregate = status.author_aggregate,
            "Creating missing tables"
        );
    }
    let event_log = EventLog::new(pool.clone());
    let store = AuthorAggregateStore::new(pool.clone());
    event_log.initialize().await?;
    store.initialize().await?;

    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(pool.clone(), &config, store).await,
        Command::Report => {
            let summary = ReportingView::new(store).snapshot().await?;
            print!("{summary}");
            Ok(())
        }
        Command::Repair { author: Some(author) } => {
            let outcome = store.repair(&author).await?;
            println!(
                "{}: drifted={} before={:?} after={:?}",
                outcome.author,
                outcome.drifted(),
                outcome.before,
                outcome.after
            );
            Ok(())
        }
        Command::Repair { author: None } => {
            let report = jobs::repair_all_authors(&store).await;
            println!(
                "checked={} repaired={} errors={}",
                report.authors_checked,
                report.authors_repaired,
                report.errors.len()
            );
            Ok(())
        }
        Command::Verify { author } => {
            let outcome = store.verify(&author).await?;
            println!(
                "{}: drifted={} count_delta={} stored={:?} recomputed={:?}",
                outcome.author,
                outcome.drifted(),
                outcome.count_delta(),
                outcome.before,
                outcome.after
            );
            Ok(())
        }
        Command::DeleteEvent { id } => {
            let admin = AdminHandler::new(pool.clone(), config.is_production());
            let deleted = admin.delete_event(id).await?;
            println!(
                "deleted event {} by {}; aggregate now {:?}",
                deleted.event.id, deleted.event.author, deleted.repair.after
            );
            Ok(())
        }
        Command::Reset { yes } => {
            if !yes {
                anyhow::bail!("refusing to reset without --yes");
            }
            AdminHandler::new(pool.clone(), config.is_production())
                .reset()
                .await?;
            println!("database reset");
            Ok(())
        }
    };

    pool.close().await;
    tracing::info!("Database connections closed. Goodbye!");
    result
}

/// Run the ingestion loop, plus the reporting server when a port is configured
async fn run(pool: SqlitePool, config: &Config, store: AuthorAggregateStore) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let server = match config.report_port {
        Some(port) => {
            let addr: SocketAddr = format!("{}:{}", config.host, port).parse()?;
            let listener = tokio::net::TcpListener::bind(addr).await?;
            tracing::info!("Reporting API listening on http://{}", addr);

            let app = build_router(pool.clone());
            let mut server_shutdown = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = server_shutdown.wait_for(|stop| *stop).await;
                    })
                    .await
            }))
        }
        None => None,
    };

    let handler = EventHandler::new(pool, config);
    let ingestion = IngestionLoop::new(handler, store, IngestConfig::from(config));

    let mut loop_shutdown = shutdown_rx;
    let cancelled = async move {
        let _ = loop_shutdown.wait_for(|stop| *stop).await;
    };

    let summary = match &config.event_source {
        EventSourceKind::Demo => {
            let source = DemoSource::new(config.demo_interval, config.demo_max_events);
            ingestion.run(source, cancelled).await
        }
        EventSourceKind::Stdin => ingestion.run(JsonLinesSource::stdin(), cancelled).await,
        EventSourceKind::File(path) => {
            let source = JsonLinesSource::open(path).await?;
            ingestion.run(source, cancelled).await
        }
    }?;

    tracing::info!(
        stop_reason = ?summary.stop_reason,
        received = summary.stats.received,
        persisted = summary.stats.persisted,
        rejected = summary.stats.rejected,
        dropped = summary.stats.dropped,
        "Ingestion finished"
    );

    if let Some(server) = server {
        // The server keeps reporting after a finite source ends, until shutdown
        server.await??;
    }

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, finishing in-flight event...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, finishing in-flight event...");
        },
    }
}
