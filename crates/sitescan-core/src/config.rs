//! Configuration management for the scanning engine.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound for `requeue.max_age_hours` (100 years).
pub const MAX_REQUEUE_AGE_HOURS: u64 = 24 * 366 * 100;

/// Main engine configuration.
///
/// This is loaded from `~/.config/sitescan/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Browser pool sizing and recycling
    pub pool: PoolConfig,
    /// Per-job analyzer behavior
    pub scanning: ScanningConfig,
    /// Queue consumer settings
    pub consumer: ConsumerConfig,
    /// Stale-result requeue settings
    pub requeue: RequeueConfig,
    /// Result store settings
    pub database: DatabaseConfig,
    /// Security data source settings
    pub security: SecurityConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, falling back to defaults if
    /// the file does not exist.
    pub fn load_from(config_path: &Path) -> ConfigResult<Self> {
        let config: Self = if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(config_path)?;
            toml::from_str(&contents)?
        } else {
            tracing::debug!("Config file not found, using defaults");
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `SITESCAN_POOL_MAX`: Override the maximum number of pooled browsers
    /// - `SITESCAN_HEADLESS`: Override browser headless mode (true/false)
    /// - `SITESCAN_CONSUMER_CONCURRENCY`: Override parallel jobs per consumer
    /// - `SITESCAN_DATABASE_PATH`: Override the SQLite database path
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup. Unparsable values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(max) = lookup("SITESCAN_POOL_MAX").and_then(|v| v.parse().ok()) {
            self.pool.max = max;
            tracing::debug!("Override pool.max from env: {}", max);
        }

        if let Some(headless) = lookup("SITESCAN_HEADLESS").and_then(|v| v.parse().ok()) {
            self.pool.headless = headless;
            tracing::debug!("Override pool.headless from env: {}", headless);
        }

        if let Some(concurrency) =
            lookup("SITESCAN_CONSUMER_CONCURRENCY").and_then(|v| v.parse().ok())
        {
            self.consumer.concurrency = concurrency;
            tracing::debug!("Override consumer.concurrency from env: {}", concurrency);
        }

        if let Some(path) = lookup("SITESCAN_DATABASE_PATH") {
            tracing::debug!("Override database.path from env: {}", path);
            self.database.path = path;
        }
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.pool.max == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pool.max".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.pool.min > self.pool.max {
            return Err(ConfigError::InvalidValue {
                field: "pool.min".to_string(),
                reason: format!("must not exceed pool.max ({})", self.pool.max),
            });
        }
        if self.scanning.max_concurrent_analyzers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scanning.max_concurrent_analyzers".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.consumer.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "consumer.concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.requeue.max_age_hours > MAX_REQUEUE_AGE_HOURS {
            return Err(ConfigError::InvalidValue {
                field: "requeue.max_age_hours".to_string(),
                reason: format!("must not exceed {MAX_REQUEUE_AGE_HOURS}"),
            });
        }
        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/sitescan/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("gov", "sitescan", "sitescan").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/sitescan`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("gov", "sitescan", "sitescan").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }
}

/// Browser pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Instances kept warm
    pub min: usize,
    /// Upper bound on live instances
    pub max: usize,
    /// Idle time after which an instance is evicted, in seconds
    pub idle_timeout_secs: u64,
    /// Acquisitions before an instance is recycled (0 = never)
    pub max_uses: u32,
    /// Run browsers headless
    pub headless: bool,
    /// How often idle instances are reaped, in seconds
    pub reaper_interval_secs: u64,
}

impl PoolConfig {
    /// Idle timeout as a `Duration`.
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Reaper interval as a `Duration`.
    #[must_use]
    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min: 1,
            max: 3,
            idle_timeout_secs: 60,
            max_uses: 100,
            headless: true,
            reaper_interval_secs: 30,
        }
    }
}

/// Per-job analyzer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanningConfig {
    /// Timeout applied to every analyzer except the primary one, in seconds
    pub analyzer_timeout_secs: u64,
    /// Timeout for the primary (home page) analyzer, in seconds
    pub primary_timeout_secs: u64,
    /// Analyzers of one job allowed to run at the same time
    pub max_concurrent_analyzers: usize,
    /// Time the client-redirect analyzer waits for script navigation, in ms
    pub client_redirect_settle_ms: u64,
    /// User agent for plain HTTP probes
    pub user_agent: String,
}

impl ScanningConfig {
    /// Analyzer timeout as a `Duration`.
    #[must_use]
    pub fn analyzer_timeout(&self) -> Duration {
        Duration::from_secs(self.analyzer_timeout_secs)
    }

    /// Primary analyzer timeout as a `Duration`.
    #[must_use]
    pub fn primary_timeout(&self) -> Duration {
        Duration::from_secs(self.primary_timeout_secs)
    }

    /// Client-redirect settle period as a `Duration`.
    #[must_use]
    pub fn client_redirect_settle(&self) -> Duration {
        Duration::from_millis(self.client_redirect_settle_ms)
    }
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            analyzer_timeout_secs: 30,
            primary_timeout_secs: 60,
            max_concurrent_analyzers: 10,
            client_redirect_settle_ms: 3000,
            user_agent: "sitescan/0.1.0 (+https://github.com/site-scanning/sitescan)".to_string(),
        }
    }
}

/// Queue consumer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Jobs processed in parallel
    pub concurrency: usize,
    /// Attempts the in-memory queue allows per job
    pub max_attempts: u32,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            max_attempts: 3,
        }
    }
}

/// Stale-result requeue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequeueConfig {
    /// Reports older than this are rescanned, in hours
    pub max_age_hours: u64,
    /// How often the requeuer runs, in seconds
    pub interval_secs: u64,
}

impl RequeueConfig {
    /// Maximum report age as a `chrono::TimeDelta`, capped at
    /// [`MAX_REQUEUE_AGE_HOURS`].
    #[must_use]
    pub fn max_age(&self) -> chrono::TimeDelta {
        let hours = self.max_age_hours.min(MAX_REQUEUE_AGE_HOURS);
        i64::try_from(hours)
            .ok()
            .and_then(chrono::TimeDelta::try_hours)
            .unwrap_or(chrono::TimeDelta::MAX)
    }

    /// Requeue interval as a `Duration`.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for RequeueConfig {
    fn default() -> Self {
        Self {
            max_age_hours: 24,
            interval_secs: 3600,
        }
    }
}

/// Result store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database path (or `:memory:`)
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "sitescan.db".to_string(),
        }
    }
}

/// Security data source settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// JSON file mapping hostnames to security posture; none disables the source
    pub data_path: Option<String>,
}
