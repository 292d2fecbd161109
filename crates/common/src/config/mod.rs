//! Configuration management for FollowRank services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Relay network configuration
    #[serde(default)]
    pub relay: RelayConfig,

    /// PageRank and graph construction tunables
    #[serde(default)]
    pub ranking: RankingConfig,

    /// Participant discovery configuration
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Query endpoint configuration
    #[serde(default)]
    pub queries: QueryConfig,

    /// Recurring job schedule
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Listing of seed participants imported at startup
    pub seed_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
    /// Relay websocket URLs queried for every request
    #[serde(default = "default_relay_urls")]
    pub urls: Vec<String>,

    /// Websocket connect timeout in seconds
    #[serde(default = "default_relay_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Time to wait for EOSE on a bounded query, in seconds
    #[serde(default = "default_relay_query_timeout")]
    pub query_timeout_secs: u64,

    /// Time a streaming subscription may stay open, in seconds
    #[serde(default = "default_relay_stream_timeout")]
    pub stream_timeout_secs: u64,

    /// Subscriptions opened per second across all relays
    #[serde(default = "default_relay_rps")]
    pub requests_per_second: u32,

    /// Burst capacity for subscriptions
    #[serde(default = "default_relay_burst")]
    pub burst: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RankingConfig {
    /// PageRank damping factor
    #[serde(default = "default_damping")]
    pub damping: f64,

    /// Hard cap on PageRank iterations
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// L1 convergence threshold
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,

    /// Follow lists resolved concurrently per batch
    #[serde(default = "default_fetch_batch_size")]
    pub fetch_batch_size: usize,

    /// Per-participant resolution timeout in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Rank records written per insert batch
    #[serde(default = "default_save_batch_size")]
    pub save_batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscoveryConfig {
    /// How far back to scan profile metadata, in hours
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    /// Rows returned by popular/isolated queries
    #[serde(default = "default_result_limit")]
    pub result_limit: u64,

    /// Window for "recently posted", in days
    #[serde(default = "default_recent_window")]
    pub recent_window_days: i64,

    /// Window for "newly registered", in days
    #[serde(default = "default_new_user_window")]
    pub new_user_window_days: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    /// Run all jobs on a timer
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Timer period in seconds
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level or filter directive (debug, info, followrank_ranker=debug)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Service name for logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_database_url() -> String { "sqlite://followrank.db?mode=rwc".to_string() }
fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 1 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_relay_urls() -> Vec<String> { vec!["wss://yabu.me".to_string()] }
fn default_relay_connect_timeout() -> u64 { 5 }
fn default_relay_query_timeout() -> u64 { 5 }
fn default_relay_stream_timeout() -> u64 { 120 }
fn default_relay_rps() -> u32 { 20 }
fn default_relay_burst() -> u32 { 10 }
fn default_damping() -> f64 { 0.85 }
fn default_max_iterations() -> usize { 100 }
fn default_epsilon() -> f64 { 0.0001 }
fn default_fetch_batch_size() -> usize { 10 }
fn default_fetch_timeout() -> u64 { 5 }
fn default_save_batch_size() -> usize { 100 }
fn default_lookback_hours() -> i64 { 24 }
fn default_result_limit() -> u64 { 10 }
fn default_recent_window() -> i64 { 30 }
fn default_new_user_window() -> i64 { 30 }
fn default_enabled() -> bool { true }
fn default_interval() -> u64 { 3600 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "followrank".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__RANKING__FETCH_BATCH_SIZE=20
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("relay.urls")
                    .try_parsing(true)
            )

            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a run meaningless or hang
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.relay.urls.is_empty() {
            return Err(ConfigError::Message("relay.urls must not be empty".into()));
        }
        if self.ranking.fetch_batch_size == 0 || self.ranking.save_batch_size == 0 {
            return Err(ConfigError::Message("ranking batch sizes must be positive".into()));
        }
        if !(self.ranking.damping > 0.0 && self.ranking.damping < 1.0) {
            return Err(ConfigError::Message(format!(
                "ranking.damping must be in (0, 1), got {}",
                self.ranking.damping
            )));
        }
        if self.ranking.epsilon <= 0.0 {
            return Err(ConfigError::Message("ranking.epsilon must be positive".into()));
        }
        if self.ranking.max_iterations == 0 {
            return Err(ConfigError::Message("ranking.max_iterations must be positive".into()));
        }
        if self.relay.requests_per_second == 0 || self.relay.burst == 0 {
            return Err(ConfigError::Message("relay rate limits must be positive".into()));
        }
        Ok(())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

impl RankingConfig {
    /// Per-participant resolution timeout
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            read_url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            seed_file: None,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            urls: default_relay_urls(),
            connect_timeout_secs: default_relay_connect_timeout(),
            query_timeout_secs: default_relay_query_timeout(),
            stream_timeout_secs: default_relay_stream_timeout(),
            requests_per_second: default_relay_rps(),
            burst: default_relay_burst(),
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            damping: default_damping(),
            max_iterations: default_max_iterations(),
            epsilon: default_epsilon(),
            fetch_batch_size: default_fetch_batch_size(),
            fetch_timeout_secs: default_fetch_timeout(),
            save_batch_size: default_save_batch_size(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self { lookback_hours: default_lookback_hours() }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            result_limit: default_result_limit(),
            recent_window_days: default_recent_window(),
            new_user_window_days: default_new_user_window(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            service_name: default_service_name(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            relay: RelayConfig::default(),
            ranking: RankingConfig::default(),
            discovery: DiscoveryConfig::default(),
            queries: QueryConfig::default(),
            schedule: ScheduleConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}
