//! Engine configuration.
//!
//! Values come from `EngineConfig::default()` or from `RECORDSYNC_*`
//! environment variables; unparsable or zero values fall back to defaults.

use std::env;
use std::time::Duration;

pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const ENV_SYNC_INTERVAL_SECS: &str = "RECORDSYNC_SYNC_INTERVAL_SECS";
const ENV_REQUEST_TIMEOUT_SECS: &str = "RECORDSYNC_REQUEST_TIMEOUT_SECS";
const ENV_FETCH_LIMIT: &str = "RECORDSYNC_FETCH_LIMIT";
const ENV_SEED_DEFAULTS: &str = "RECORDSYNC_SEED_DEFAULTS";

/// Runtime knobs for the sync engine and scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Period of the background sync timer.
    pub sync_interval: Duration,
    /// Upper bound for each remote fetch or push.
    pub request_timeout: Duration,
    /// Optional cap passed to remote fetches.
    pub fetch_limit: Option<u32>,
    /// Seed the default record set when the local store is empty.
    pub seed_defaults_when_empty: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sync_interval: DEFAULT_SYNC_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            fetch_limit: None,
            seed_defaults_when_empty: false,
        }
    }
}

impl EngineConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            sync_interval: parse_secs(lookup(ENV_SYNC_INTERVAL_SECS))
                .unwrap_or(defaults.sync_interval),
            request_timeout: parse_secs(lookup(ENV_REQUEST_TIMEOUT_SECS))
                .unwrap_or(defaults.request_timeout),
            fetch_limit: lookup(ENV_FETCH_LIMIT)
                .and_then(|value| value.trim().parse::<u32>().ok())
                .filter(|limit| *limit > 0),
            seed_defaults_when_empty: lookup(ENV_SEED_DEFAULTS)
                .and_then(|value| parse_bool(&value))
                .unwrap_or(defaults.seed_defaults_when_empty),
        }
    }
}

fn parse_secs(value: Option<String>) -> Option<Duration> {
    value
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
