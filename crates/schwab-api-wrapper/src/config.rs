//! Client configuration loaded from YAML with environment overrides.
//!
//! ```yaml
//! client_id: my-app-key
//! client_secret: my-app-secret
//! redirect_uri: https://127.0.0.1
//! token_store:
//!   kind: file
//!   path: ~/.config/schwab-api-wrapper/tokens.json
//! ```
//!
//! A leading `~` in `token_store.path` is the user's home directory.
//! Credentials may be left out of the file and supplied through
//! `SCHWAB_CLIENT_ID`, `SCHWAB_CLIENT_SECRET` and friends instead.

use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::RetryConfig;

pub const DEFAULT_TRADER_BASE_URL: &str = "https://api.schwabapi.com/trader/v1";
pub const DEFAULT_MARKET_DATA_BASE_URL: &str = "https://api.schwabapi.com/marketdata/v1";
pub const DEFAULT_OAUTH_BASE_URL: &str = "https://api.schwabapi.com/v1/oauth";
pub const DEFAULT_REDIRECT_URI: &str = "https://127.0.0.1";

pub const ENV_CLIENT_ID: &str = "SCHWAB_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "SCHWAB_CLIENT_SECRET";
pub const ENV_REDIRECT_URI: &str = "SCHWAB_REDIRECT_URI";
pub const ENV_REDIS_URL: &str = "SCHWAB_REDIS_URL";
pub const ENV_TOKEN_PATH: &str = "SCHWAB_TOKEN_PATH";
pub const ENV_TOKEN_KEY: &str = "SCHWAB_TOKEN_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Where OAuth tokens are persisted between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStoreKind {
    #[default]
    Memory,
    File,
    Redis,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenStoreConfig {
    pub kind: TokenStoreKind,
    pub path: Option<PathBuf>,
    pub redis_url: Option<String>,
    pub key_prefix: String,
    /// Passphrase for encrypting tokens at rest. Plain JSON when unset.
    pub encryption_key: Option<String>,
}

impl Default for TokenStoreConfig {
    fn default() -> Self {
        Self {
            kind: TokenStoreKind::Memory,
            path: None,
            redis_url: None,
            key_prefix: String::from("schwab:tokens"),
            encryption_key: None,
        }
    }
}

impl Debug for TokenStoreConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStoreConfig")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "<redacted>"))
            .field("key_prefix", &self.key_prefix)
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 120,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(self) -> RetryConfig {
        RetryConfig::exponential(self.max_retries, self.base_delay_ms, self.max_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// TTL for quotes and price history.
    pub quote_ttl_ms: u64,
    /// TTL for slow-moving data: market hours, instruments, expirations.
    pub reference_ttl_ms: u64,
    /// Upper bound on cached responses per client.
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            quote_ttl_ms: 1_000,
            reference_ttl_ms: 300_000,
            max_entries: crate::cache::DEFAULT_MAX_ENTRIES,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub trader_base_url: String,
    pub market_data_base_url: String,
    pub oauth_base_url: String,
    pub timeout_ms: u64,
    pub token_store: TokenStoreConfig,
    pub rate_limit: RateLimitConfig,
    pub retry: RetrySettings,
    pub cache: CacheSettings,
    /// Refresh this many seconds before the access token expires.
    pub refresh_skew_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::from(DEFAULT_REDIRECT_URI),
            trader_base_url: String::from(DEFAULT_TRADER_BASE_URL),
            market_data_base_url: String::from(DEFAULT_MARKET_DATA_BASE_URL),
            oauth_base_url: String::from(DEFAULT_OAUTH_BASE_URL),
            timeout_ms: 10_000,
            token_store: TokenStoreConfig::default(),
            rate_limit: RateLimitConfig::default(),
            retry: RetrySettings::default(),
            cache: CacheSettings::default(),
            refresh_skew_secs: 60,
        }
    }
}

impl Debug for ClientConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("trader_base_url", &self.trader_base_url)
            .field("market_data_base_url", &self.market_data_base_url)
            .field("oauth_base_url", &self.oauth_base_url)
            .field("timeout_ms", &self.timeout_ms)
            .field("token_store", &self.token_store)
            .field("rate_limit", &self.rate_limit)
            .field("retry", &self.retry)
            .field("cache", &self.cache)
            .field("refresh_skew_secs", &self.refresh_skew_secs)
            .finish()
    }
}

/// Replaces a leading `~` component with the home directory. Paths are
/// returned unchanged when there is no `~` or no known home.
pub fn expand_home(path: PathBuf) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path;
    };
    match dirs::home_dir() {
        Some(home) if rest.as_os_str().is_empty() => home,
        Some(home) => home.join(rest),
        None => path,
    }
}

impl ClientConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            ..Self::default()
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: Self = serde_yaml::from_str(content)?;
        config.token_store.path = config.token_store.path.map(expand_home);
        Ok(config)
    }

    /// Reads the YAML file (a missing file yields defaults), applies the
    /// process environment and validates the result.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => Self::from_yaml_str(&content)?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overrides fields from `SCHWAB_*` variables. `lookup` abstracts the
    /// environment so callers can inject their own source.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(value) = lookup(ENV_CLIENT_ID) {
            self.client_id = value;
        }
        if let Some(value) = lookup(ENV_CLIENT_SECRET) {
            self.client_secret = value;
        }
        if let Some(value) = lookup(ENV_REDIRECT_URI) {
            self.redirect_uri = value;
        }
        if let Some(value) = lookup(ENV_REDIS_URL) {
            self.token_store.redis_url = Some(value);
            self.token_store.kind = TokenStoreKind::Redis;
        }
        if let Some(value) = lookup(ENV_TOKEN_PATH) {
            self.token_store.path = Some(expand_home(PathBuf::from(value)));
            if self.token_store.kind == TokenStoreKind::Memory {
                self.token_store.kind = TokenStoreKind::File;
            }
        }
        if let Some(value) = lookup(ENV_TOKEN_KEY) {
            self.token_store.encryption_key = Some(value);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "client_id" });
        }
        if self.client_secret.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "client_secret",
            });
        }
        if !self.redirect_uri.starts_with("https://") {
            return Err(ConfigError::Invalid {
                field: "redirect_uri",
                reason: String::from("Schwab requires an https:// callback URL"),
            });
        }

        for (field, url) in [
            ("trader_base_url", &self.trader_base_url),
            ("market_data_base_url", &self.market_data_base_url),
            ("oauth_base_url", &self.oauth_base_url),
        ] {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("'{url}' is not an http(s) URL"),
                });
            }
        }

        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms",
                reason: String::from("must be greater than zero"),
            });
        }
        if self.rate_limit.requests_per_minute == 0 {
            return Err(ConfigError::Invalid {
                field: "rate_limit.requests_per_minute",
                reason: String::from("must be greater than zero"),
            });
        }

        match self.token_store.kind {
            TokenStoreKind::File if self.token_store.path.is_none() => {
                Err(ConfigError::MissingField {
                    field: "token_store.path",
                })
            }
            TokenStoreKind::Redis if self.token_store.redis_url.is_none() => {
                Err(ConfigError::MissingField {
                    field: "token_store.redis_url",
                })
            }
            _ => Ok(()),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn quote_ttl(&self) -> Duration {
        Duration::from_millis(self.cache.quote_ttl_ms)
    }

    pub fn reference_ttl(&self) -> Duration {
        Duration::from_millis(self.cache.reference_ttl_ms)
    }

    pub fn refresh_skew(&self) -> time::Duration {
        time::Duration::seconds(i64::try_from(self.refresh_skew_secs).unwrap_or(i64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_production_endpoints() {
        let config = ClientConfig::default();
        assert_eq!(config.trader_base_url, DEFAULT_TRADER_BASE_URL);
        assert_eq!(config.market_data_base_url, DEFAULT_MARKET_DATA_BASE_URL);
        assert_eq!(config.rate_limit.requests_per_minute, 120);
        assert_eq!(config.refresh_skew_secs, 60);
        assert_eq!(config.token_store.key_prefix, "schwab:tokens");
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = ClientConfig::new("app-key", "super-secret");
        config.token_store.encryption_key = Some(String::from("passphrase"));

        let rendered = format!("{config:?}");
        assert!(rendered.contains("app-key"));
        assert!(!rendered.contains("super-secret"));
        assert!(!rendered.contains("passphrase"));
    }

    #[test]
    fn localhost_https_redirect_is_accepted() {
        let mut config = ClientConfig::new("id", "secret");
        config.redirect_uri = String::from("https://127.0.0.1:8182");
        assert!(config.validate().is_ok());

        config.redirect_uri = String::from("http://127.0.0.1");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "redirect_uri", .. })
        ));
    }
}
