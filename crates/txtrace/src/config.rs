//! Configuration management for txtrace.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.
//! Command-line flags are applied on top by the binary.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::esplora::client::DEFAULT_TIMEOUT_SECS;
use crate::esplora::retry::{DEFAULT_BACKOFF_BASE, DEFAULT_MAX_RETRIES};
use crate::esplora::{ApiSource, RetryPolicy};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "txtrace";

/// Default cache database file name.
const CACHE_FILE_NAME: &str = "lookups.db";

/// Prefix for environment overrides.
const ENV_PREFIX: &str = "TXTRACE_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `TXTRACE_`, `__` between levels)
/// 2. TOML config file at `~/.config/txtrace/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Block explorer API configuration.
    pub api: ApiConfig,
    /// Lookup pacing and checkpointing.
    pub lookup: LookupConfig,
    /// Lookup cache configuration.
    pub cache: CacheConfig,
}

/// Block explorer API configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Preset endpoint.
    pub source: ApiSource,
    /// Custom Esplora base URL; overrides `source` when set.
    pub base_url: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// Lookup pacing and checkpointing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Maximum requests per second. 0 disables pacing.
    pub rate_limit_per_sec: f64,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
    /// Base of the backoff curve.
    pub backoff_base: f64,
    /// Write results every N lookups.
    pub checkpoint_every: usize,
    /// Name of the txid column in input files.
    pub txid_column: String,
}

/// Lookup cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Use the lookup cache.
    pub enabled: bool,
    /// Path to the cache database.
    /// Defaults to `~/.local/share/txtrace/lookups.db`
    pub database_path: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            source: ApiSource::default(),
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_sec: 4.0,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
            checkpoint_every: 100,
            txid_column: "txid".to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            database_path: None,
        }
    }
}

impl Config {
    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file that must exist.
    ///
    /// [`Config::load_from`] treats a missing file as empty; this is for
    /// checking a file the user named explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigNotFound`] if `path` is not a file, otherwise
    /// as [`Config::load_from`].
    pub fn load_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(Error::ConfigNotFound { path });
        }
        Self::load_from(Some(path))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let rate = self.lookup.rate_limit_per_sec;
        if !rate.is_finite() || rate < 0.0 {
            return Err(Error::config_validation(format!(
                "rate_limit_per_sec must be a non-negative number, got {rate}"
            )));
        }

        if self.lookup.checkpoint_every == 0 {
            return Err(Error::config_validation(
                "checkpoint_every must be greater than 0",
            ));
        }

        let base = self.lookup.backoff_base;
        if !base.is_finite() || base <= 0.0 {
            return Err(Error::config_validation(format!(
                "backoff_base must be greater than 0, got {base}"
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(Error::config_validation(
                "timeout_secs must be greater than 0",
            ));
        }

        if let Some(url) = &self.api.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::config_validation(format!(
                    "base_url must start with http:// or https://, got '{url}'"
                )));
            }
        }

        if self.lookup.txid_column.trim().is_empty() {
            return Err(Error::config_validation("txid_column must not be empty"));
        }

        Ok(())
    }

    /// Get the cache database path, resolving defaults if not set.
    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        self.cache
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(CACHE_FILE_NAME))
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// Get the retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.lookup.max_retries,
            backoff_base: self.lookup.backoff_base,
        }
    }

    /// Name written to the `api_source` column for this configuration.
    #[must_use]
    pub fn source_name(&self) -> &str {
        if self.api.base_url.is_some() {
            crate::esplora::CUSTOM_SOURCE_NAME
        } else {
            self.api.source.name()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.api.source, ApiSource::Blockstream);
        assert!(config.api.base_url.is_none());
        assert_eq!(config.api.timeout_secs, 15);
        assert!((config.lookup.rate_limit_per_sec - 4.0).abs() < f64::EPSILON);
        assert_eq!(config.lookup.max_retries, 5);
        assert_eq!(config.lookup.checkpoint_every, 100);
        assert_eq!(config.lookup.txid_column, "txid");
        assert!(config.cache.enabled);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_rate_is_allowed() {
        let mut config = Config::default();
        config.lookup.rate_limit_per_sec = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_negative_rate() {
        let mut config = Config::default();
        config.lookup.rate_limit_per_sec = -1.0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("rate_limit_per_sec"));
    }

    #[test]
    fn test_validate_zero_checkpoint() {
        let mut config = Config::default();
        config.lookup.checkpoint_every = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("checkpoint_every"));
    }

    #[test]
    fn test_validate_backoff_base() {
        let mut config = Config::default();
        config.lookup.backoff_base = 0.0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("backoff_base"));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.api.timeout_secs = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("timeout_secs"));
    }

    #[test]
    fn test_validate_base_url_scheme() {
        let mut config = Config::default();
        config.api.base_url = Some("ftp://example.com/api".to_string());
        assert!(config.validate().is_err());

        config.api.base_url = Some("http://localhost:3002/api".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_source_name() {
        let mut config = Config::default();
        assert_eq!(config.source_name(), "blockstream");

        config.api.source = ApiSource::Mempool;
        assert_eq!(config.source_name(), "mempool");

        config.api.base_url = Some("http://localhost:3002/api".to_string());
        assert_eq!(config.source_name(), "custom");
    }

    #[test]
    fn test_cache_path_default() {
        let config = Config::default();
        let path = config.cache_path();
        assert!(path.to_string_lossy().contains("txtrace"));
        assert!(path.to_string_lossy().ends_with("lookups.db"));
    }

    #[test]
    fn test_cache_path_custom() {
        let mut config = Config::default();
        config.cache.database_path = Some(PathBuf::from("/custom/lookups.sqlite"));
        assert_eq!(config.cache_path(), PathBuf::from("/custom/lookups.sqlite"));
    }

    #[test]
    fn test_retry_policy_and_timeout() {
        let config = Config::default();
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("txtrace"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[api]
source = "mempool"

[lookup]
rate_limit_per_sec = 1.5
checkpoint_every = 10

[cache]
enabled = false
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.api.source, ApiSource::Mempool);
        assert!((config.lookup.rate_limit_per_sec - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.lookup.checkpoint_every, 10);
        assert_eq!(config.lookup.max_retries, 5);
        assert!(!config.cache.enabled);
    }

    #[test]
    fn test_load_rejects_invalid_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[lookup]\ncheckpoint_every = 0\n").unwrap();

        let err = Config::load_from(Some(path)).unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));
    }

    #[test]
    fn test_load_rejects_unknown_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api]\nsource = \"electrum\"\n").unwrap();

        let err = Config::load_from(Some(path)).unwrap_err();
        assert!(matches!(err, Error::ConfigLoad(_)));
    }

    #[test]
    fn test_load_source_ignores_case_and_padding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api]\nsource = \" Mempool \"\n").unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.api.source, ApiSource::Mempool);
        assert_eq!(config.source_name(), "mempool");
    }

    #[test]
    fn test_load_file_requires_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("typo.toml");

        let err = Config::load_file(&missing).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
        assert!(err.to_string().contains("typo.toml"));
    }

    #[test]
    fn test_load_file_reads_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[lookup]\nmax_retries = 2\n").unwrap();

        let config = Config::load_file(&path).unwrap();
        assert_eq!(config.lookup.max_retries, 2);
    }

    #[test]
    fn test_config_serialize() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("rate_limit_per_sec"));
        assert!(json.contains("\"blockstream\""));
    }
}
