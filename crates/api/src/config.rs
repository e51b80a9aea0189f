//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use event_store::StreamConfig;
use orders::OrderServiceConfig;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset means in-memory stores
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `5`)
/// - `COMMAND_TIMEOUT_MS`: per-operation timeout (default: `5000`)
/// - `PUBLISH_TIMEOUT_MS`: bound on publishing stored events (default: `5000`)
/// - `OPTIMISTIC_CONCURRENCY`: reject stale appends (default: `false`)
/// - `EVENT_STREAM_POLL_MS`: event stream poll interval (default: `1000`)
/// - `REBUILD_PROJECTIONS_ON_START`: replay the event log into the read model at startup (default: `true`)
///
/// Unparseable values fall back to their defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub command_timeout: Duration,
    pub publish_timeout: Duration,
    pub optimistic_concurrency: bool,
    pub event_stream_poll_interval: Duration,
    pub rebuild_projections_on_start: bool,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let millis = |key: &str| parse(&lookup, key).map(Duration::from_millis);

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.log_format),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: parse(&lookup, "DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            command_timeout: millis("COMMAND_TIMEOUT_MS").unwrap_or(defaults.command_timeout),
            publish_timeout: millis("PUBLISH_TIMEOUT_MS").unwrap_or(defaults.publish_timeout),
            optimistic_concurrency: parse(&lookup, "OPTIMISTIC_CONCURRENCY")
                .unwrap_or(defaults.optimistic_concurrency),
            event_stream_poll_interval: millis("EVENT_STREAM_POLL_MS")
                .unwrap_or(defaults.event_stream_poll_interval),
            rebuild_projections_on_start: parse(&lookup, "REBUILD_PROJECTIONS_ON_START")
                .unwrap_or(defaults.rebuild_projections_on_start),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn service_config(&self) -> OrderServiceConfig {
        OrderServiceConfig::new()
            .command_timeout(self.command_timeout)
            .publish_timeout(self.publish_timeout)
            .optimistic_concurrency(self.optimistic_concurrency)
    }

    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig::default().poll_interval(self.event_stream_poll_interval)
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|value| value.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 5,
            command_timeout: OrderServiceConfig::DEFAULT_COMMAND_TIMEOUT,
            publish_timeout: OrderServiceConfig::DEFAULT_PUBLISH_TIMEOUT,
            optimistic_concurrency: false,
            event_stream_poll_interval: Duration::from_secs(1),
            rebuild_projections_on_start: true,
        }
    }
}
