//! Sync engine configuration

use std::env;
use std::str::FromStr;
use std::time::Duration;

use market_backend::{Session, WalletAddress, DEFAULT_LOOKBACK_HOURS};

/// Configuration for the markets controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Backend base URL, e.g. `https://api.example.com`
    pub api_base_url: String,
    /// Wallet public key; no wallet means no session
    pub wallet: Option<String>,
    /// Bearer token for backend calls
    pub token: Option<String>,
    /// Resolved-market lookback window
    pub lookback_hours: u32,
    /// Try the push stream before falling back to snapshots
    pub stream_enabled: bool,
    /// Close the stream when no frame arrives within this window
    pub stream_idle_timeout: Option<Duration>,
    /// Re-fetch snapshots on this interval while the stream is down
    pub poll_interval: Option<Duration>,
    /// Total timeout for one REST request
    pub request_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            wallet: None,
            token: None,
            lookback_hours: DEFAULT_LOOKBACK_HOURS,
            stream_enabled: true,
            stream_idle_timeout: Some(Duration::from_secs(default_idle_timeout_secs())),
            poll_interval: None,
            request_timeout: Duration::from_secs(default_request_timeout_secs()),
        }
    }
}

impl SyncConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables
    ///
    /// Expects:
    /// - MARKETS_API_URL: backend base URL (required)
    /// - MARKETS_WALLET, MARKETS_JWT: session credentials (optional)
    /// - MARKETS_LOOKBACK_HOURS, MARKETS_STREAM_ENABLED,
    ///   MARKETS_STREAM_IDLE_TIMEOUT_SECS, MARKETS_POLL_INTERVAL_SECS,
    ///   MARKETS_REQUEST_TIMEOUT_SECS: tuning (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`SyncConfig::from_env`] with an explicit variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_base_url = get("MARKETS_API_URL").ok_or(ConfigError::Missing("MARKETS_API_URL"))?;

        let lookback_hours = parse_or(get("MARKETS_LOOKBACK_HOURS"), "MARKETS_LOOKBACK_HOURS", DEFAULT_LOOKBACK_HOURS)?;
        if lookback_hours == 0 {
            return Err(ConfigError::invalid("MARKETS_LOOKBACK_HOURS", "must be at least 1"));
        }

        let stream_enabled = match get("MARKETS_STREAM_ENABLED") {
            None => true,
            Some(v) => parse_bool(&v).ok_or_else(|| {
                ConfigError::invalid("MARKETS_STREAM_ENABLED", format!("expected a boolean, got '{}'", v))
            })?,
        };

        let idle_secs = parse_or(
            get("MARKETS_STREAM_IDLE_TIMEOUT_SECS"),
            "MARKETS_STREAM_IDLE_TIMEOUT_SECS",
            default_idle_timeout_secs(),
        )?;
        let poll_secs = parse_or(get("MARKETS_POLL_INTERVAL_SECS"), "MARKETS_POLL_INTERVAL_SECS", 0u64)?;
        let request_secs = parse_or(
            get("MARKETS_REQUEST_TIMEOUT_SECS"),
            "MARKETS_REQUEST_TIMEOUT_SECS",
            default_request_timeout_secs(),
        )?;
        if request_secs == 0 {
            return Err(ConfigError::invalid("MARKETS_REQUEST_TIMEOUT_SECS", "must be at least 1"));
        }

        let config = Self {
            api_base_url,
            wallet: get("MARKETS_WALLET"),
            token: get("MARKETS_JWT"),
            lookback_hours,
            stream_enabled,
            stream_idle_timeout: non_zero_secs(idle_secs),
            poll_interval: non_zero_secs(poll_secs),
            request_timeout: Duration::from_secs(request_secs),
        };

        // Surface a bad wallet at startup rather than on first fetch
        config.session()?;
        Ok(config)
    }

    /// The wallet session, if a wallet is configured
    pub fn session(&self) -> Result<Option<Session>, ConfigError> {
        self.wallet
            .as_deref()
            .map(|wallet| {
                WalletAddress::parse(wallet)
                    .map(Session::new)
                    .map_err(|e| ConfigError::invalid("MARKETS_WALLET", e.to_string()))
            })
            .transpose()
    }
}

fn default_idle_timeout_secs() -> u64 {
    90
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn parse_or<T: FromStr>(value: Option<String>, field: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(field, format!("'{}': {}", v, e))),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("Invalid {field}: {error}")]
    Invalid { field: &'static str, error: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, error: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const WALLET: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";

    fn load(vars: &[(&str, &str)]) -> Result<SyncConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        SyncConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("MARKETS_API_URL", "https://api.example.com")]).unwrap();
        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.lookback_hours, 24);
        assert!(config.stream_enabled);
        assert_eq!(config.stream_idle_timeout, Some(Duration::from_secs(90)));
        assert_eq!(config.poll_interval, None);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.session().unwrap(), None);
    }

    #[test]
    fn test_full_environment() {
        let config = load(&[
            ("MARKETS_API_URL", "http://localhost:4000"),
            ("MARKETS_WALLET", WALLET),
            ("MARKETS_JWT", "jwt-token"),
            ("MARKETS_LOOKBACK_HOURS", "72"),
            ("MARKETS_STREAM_ENABLED", "off"),
            ("MARKETS_STREAM_IDLE_TIMEOUT_SECS", "0"),
            ("MARKETS_POLL_INTERVAL_SECS", "15"),
        ])
        .unwrap();

        assert_eq!(config.lookback_hours, 72);
        assert!(!config.stream_enabled);
        assert_eq!(config.stream_idle_timeout, None);
        assert_eq!(config.poll_interval, Some(Duration::from_secs(15)));
        assert_eq!(config.token.as_deref(), Some("jwt-token"));
        assert_eq!(config.session().unwrap().unwrap().wallet.as_str(), WALLET);
    }

    #[test]
    fn test_missing_url() {
        assert_eq!(load(&[]), Err(ConfigError::Missing("MARKETS_API_URL")));
        assert_eq!(
            load(&[("MARKETS_API_URL", "  ")]),
            Err(ConfigError::Missing("MARKETS_API_URL"))
        );
    }

    #[test]
    fn test_invalid_values() {
        let err = load(&[("MARKETS_API_URL", "http://x"), ("MARKETS_LOOKBACK_HOURS", "a day")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "MARKETS_LOOKBACK_HOURS", .. }));

        let err = load(&[("MARKETS_API_URL", "http://x"), ("MARKETS_LOOKBACK_HOURS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "MARKETS_LOOKBACK_HOURS", .. }));

        let err = load(&[("MARKETS_API_URL", "http://x"), ("MARKETS_STREAM_ENABLED", "maybe")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "MARKETS_STREAM_ENABLED", .. }));

        let err = load(&[("MARKETS_API_URL", "http://x"), ("MARKETS_WALLET", "0xdeadbeef")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "MARKETS_WALLET", .. }));
    }
}
