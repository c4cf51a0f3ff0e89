//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Where the ingestion loop pulls events from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSourceKind {
    /// Built-in generator rotating over a few authors
    Demo,
    /// Newline-delimited JSON on standard input
    Stdin,
    /// Newline-delimited JSON read from a file
    File(PathBuf),
}

impl FromStr for EventSourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "demo" => Ok(Self::Demo),
            "stdin" | "-" => Ok(Self::Stdin),
            other => match other.strip_prefix("file:") {
                Some(path) if !path.is_empty() => Ok(Self::File(PathBuf::from(path))),
                _ => Err(ConfigError::InvalidValue("EVENT_SOURCE")),
            },
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Upper bound on any single storage step
    pub storage_timeout: Duration,

    /// Backoff between retries when storage is unavailable
    pub retry_delay: Duration,

    /// Retries before an event is dropped on unavailable storage
    pub max_storage_retries: u32,

    /// Event source selection
    pub event_source: EventSourceKind,

    /// Delay between demo events
    pub demo_interval: Duration,

    /// Stop the demo source after this many events (0 = unlimited)
    pub demo_max_events: u64,

    /// Log the reporting view after every processed event
    pub report_every_event: bool,

    /// Cadence of the periodic repair pass, if enabled
    pub repair_interval: Option<Duration>,

    /// Reject sentiment scores outside [0.0, 1.0]
    pub enforce_sentiment_range: bool,

    /// Reporting server host
    pub host: String,

    /// Reporting server port; the HTTP surface is disabled when unset
    pub report_port: Option<u16>,

    /// Environment (development, production)
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://data/buzz.sqlite".to_string());

        let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", 5)?;
        let storage_timeout = Duration::from_millis(parse_or("STORAGE_TIMEOUT_MS", 5_000)?);
        let retry_delay = Duration::from_millis(parse_or("RETRY_DELAY_MS", 1_000)?);
        let max_storage_retries = parse_or("MAX_STORAGE_RETRIES", 3)?;

        let event_source = env::var("EVENT_SOURCE")
            .unwrap_or_else(|_| "demo".to_string())
            .parse()?;

        let demo_interval = Duration::from_millis(parse_or("DEMO_INTERVAL_MS", 2_000)?);
        let demo_max_events = parse_or("DEMO_MAX_EVENTS", 0)?;
        let report_every_event = parse_or("REPORT_EVERY_EVENT", true)?;

        let repair_interval = parse_optional::<u64>("REPAIR_INTERVAL_SECS")?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let enforce_sentiment_range = parse_or("ENFORCE_SENTIMENT_RANGE", true)?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let report_port = parse_optional("REPORT_PORT")?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        Ok(Self {
            database_url,
            database_max_connections,
            storage_timeout,
            retry_delay,
            max_storage_retries,
            event_source,
            demo_interval,
            demo_max_events,
            report_every_event,
            repair_interval,
            enforce_sentiment_range,
            host,
            report_port,
            environment,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://data/buzz.sqlite".to_string(),
            database_max_connections: 5,
            storage_timeout: Duration::from_secs(5),
            retry_delay: Duration::from_secs(1),
            max_storage_retries: 3,
            event_source: EventSourceKind::Demo,
            demo_interval: Duration::from_secs(2),
            demo_max_events: 0,
            report_every_event: true,
            repair_interval: None,
            enforce_sentiment_range: true,
            host: "127.0.0.1".to_string(),
            report_port: None,
            environment: "development".to_string(),
        }
    }
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    Ok(parse_optional(key)?.unwrap_or(default))
}

fn parse_optional<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(key)),
        Err(_) => Ok(None),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
