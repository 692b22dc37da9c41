//! Process configuration
//!
//! Everything here is read once at startup and handed to the synchronizer
//! as an immutable [`SyncSettings`].

use chartsync_kube::{DEFAULT_CONFIG_NAMESPACE, DEFAULT_RESYNC_INTERVAL, SyncSettings};
use clap::{Args, ValueEnum};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the resync interval in seconds
pub const RESYNC_PERIOD_ENV: &str = "REPOSITORY_RECONCILE_PERIOD_SECONDS";

/// Settings shared by every command that runs passes
#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    /// Namespace holding CA ConfigMaps and client certificate Secrets
    #[arg(long, env = "CHARTSYNC_CONFIG_NAMESPACE", default_value = DEFAULT_CONFIG_NAMESPACE)]
    pub config_namespace: String,

    /// Timeout for fetching a repository index, in seconds
    #[arg(
        long,
        env = "CHARTSYNC_FETCH_TIMEOUT_SECONDS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub fetch_timeout: u64,

    /// Delay before a failed pass is retried, in seconds
    #[arg(
        long,
        env = "CHARTSYNC_ERROR_REQUEUE_SECONDS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub error_requeue: u64,
}

impl SyncArgs {
    /// Combine the flags with the resync interval
    pub fn settings(&self, resync_interval: Duration) -> SyncSettings {
        SyncSettings {
            resync_interval,
            error_requeue: Duration::from_secs(self.error_requeue),
            fetch_timeout: Duration::from_secs(self.fetch_timeout),
            config_namespace: self.config_namespace.clone(),
        }
    }
}

/// Read the resync interval from the environment
pub fn resync_interval_from_env() -> Duration {
    parse_resync_interval(std::env::var(RESYNC_PERIOD_ENV).ok().as_deref())
}

/// Parse a resync interval in seconds
///
/// Missing, non-numeric and zero values fall back to the default.
pub fn parse_resync_interval(raw: Option<&str>) -> Duration {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RESYNC_INTERVAL)
}

/// Log output format
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install the global tracing subscriber
///
/// The filter comes from `RUST_LOG` and defaults to `info`.
pub fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
