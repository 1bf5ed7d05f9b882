//! # Service Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CUSTOMS_DB_PATH=/var/lib/customs/customs.db                        │
//! │     CUSTOMS_LOCAL_CURRENCY=JMD                                         │
//! │     CUSTOMS_REFERENCE_CURRENCY=USD                                     │
//! │     CUSTOMS_REFRESH_SECS=300                                           │
//! │     CUSTOMS_MAX_RATE_AGE_HOURS=96                                      │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/customs-engine/customs.toml (Linux)                      │
//! │     ~/Library/Application Support/org.customs.customs-engine/… (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "customs.db"
//!
//! [currency]
//! local = "JMD"
//! reference = "USD"
//!
//! [refresh]
//! interval_secs = 300
//! max_rate_age_hours = 96
//! ```

use customs_core::currency::CurrencyCode;
use customs_core::engine::DEFAULT_MAX_RATE_AGE_HOURS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};

pub const ENV_DB_PATH: &str = "CUSTOMS_DB_PATH";
pub const ENV_LOCAL_CURRENCY: &str = "CUSTOMS_LOCAL_CURRENCY";
pub const ENV_REFERENCE_CURRENCY: &str = "CUSTOMS_REFERENCE_CURRENCY";
pub const ENV_REFRESH_SECS: &str = "CUSTOMS_REFRESH_SECS";
pub const ENV_MAX_RATE_AGE_HOURS: &str = "CUSTOMS_MAX_RATE_AGE_HOURS";

const CONFIG_FILE_NAME: &str = "customs.toml";

// =============================================================================
// Sections
// =============================================================================

/// Where the rate store lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("customs.db")
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
        }
    }
}

/// Local (duty) currency and reference (threshold) currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencySettings {
    #[serde(default = "default_local_currency")]
    pub local: String,

    #[serde(default = "default_reference_currency")]
    pub reference: String,
}

fn default_local_currency() -> String {
    "JMD".to_string()
}

fn default_reference_currency() -> String {
    "USD".to_string()
}

impl Default for CurrencySettings {
    fn default() -> Self {
        CurrencySettings {
            local: default_local_currency(),
            reference: default_reference_currency(),
        }
    }
}

/// Snapshot refresh behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSettings {
    /// Seconds between snapshot reloads.
    #[serde(default = "default_refresh_interval")]
    pub interval_secs: u64,

    /// Rate tables older than this are refused by the engine.
    #[serde(default = "default_max_rate_age")]
    pub max_rate_age_hours: i64,
}

fn default_refresh_interval() -> u64 {
    300
}

fn default_max_rate_age() -> i64 {
    DEFAULT_MAX_RATE_AGE_HOURS
}

impl Default for RefreshSettings {
    fn default() -> Self {
        RefreshSettings {
            interval_secs: default_refresh_interval(),
            max_rate_age_hours: default_max_rate_age(),
        }
    }
}

// =============================================================================
// Service Configuration
// =============================================================================

/// Complete service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub currency: CurrencySettings,

    #[serde(default)]
    pub refresh: RefreshSettings,
}

impl ServiceConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`customs.toml`)
    /// 3. Environment variables
    ///
    /// An explicitly given path must exist; the default path is optional.
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = match config_path {
            Some(path) => Self::from_file(&path)?,
            None => match Self::default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                Some(path) => {
                    debug!(?path, "Config file not found, using defaults");
                    Self::default()
                }
                None => Self::default(),
            },
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML file. Missing sections and keys take their defaults.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        info!(?path, "Loading service config from file");
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("{}: {}", path.display(), e)))?;
        Ok(toml::from_str(&contents)?)
    }

    /// Saves configuration to file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        info!(?path, "Service config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("database.path", "must not be empty"));
        }

        self.currencies()?;

        if self.refresh.interval_secs == 0 {
            return Err(ConfigError::invalid(
                "refresh.interval_secs",
                "must be greater than 0",
            ));
        }
        if self.refresh.max_rate_age_hours <= 0 {
            return Err(ConfigError::invalid(
                "refresh.max_rate_age_hours",
                "must be greater than 0",
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup` (the process environment in production).
    ///
    /// Unparseable numbers are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(ENV_DB_PATH) {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(local) = lookup(ENV_LOCAL_CURRENCY) {
            debug!(local = %local, "Overriding local currency from environment");
            self.currency.local = local;
        }

        if let Some(reference) = lookup(ENV_REFERENCE_CURRENCY) {
            debug!(reference = %reference, "Overriding reference currency from environment");
            self.currency.reference = reference;
        }

        if let Some(secs) = lookup(ENV_REFRESH_SECS) {
            match secs.trim().parse::<u64>() {
                Ok(secs) => self.refresh.interval_secs = secs,
                Err(_) => warn!(value = %secs, "Ignoring invalid {}", ENV_REFRESH_SECS),
            }
        }

        if let Some(hours) = lookup(ENV_MAX_RATE_AGE_HOURS) {
            match hours.trim().parse::<i64>() {
                Ok(hours) => self.refresh.max_rate_age_hours = hours,
                Err(_) => warn!(value = %hours, "Ignoring invalid {}", ENV_MAX_RATE_AGE_HOURS),
            }
        }
    }

    /// Default config file path for this platform.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "customs", "customs-engine")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Parsed `(local, reference)` currency codes.
    pub fn currencies(&self) -> ConfigResult<(CurrencyCode, CurrencyCode)> {
        let local = CurrencyCode::parse_field(&self.currency.local, "currency.local")
            .map_err(|e| ConfigError::invalid("currency.local", e.to_string()))?;
        let reference = CurrencyCode::parse_field(&self.currency.reference, "currency.reference")
            .map_err(|e| ConfigError::invalid("currency.reference", e.to_string()))?;
        Ok((local, reference))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh.interval_secs)
    }

    pub fn max_rate_age(&self) -> chrono::Duration {
        chrono::Duration::hours(self.refresh.max_rate_age_hours)
    }
}
