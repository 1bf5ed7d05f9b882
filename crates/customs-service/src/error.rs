//! # Service Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Service Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  ConfigError    │  │  Snapshot       │  │  Engine / Storage       │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  LoadFailed     │  │  NoSnapshot     │  │  Core(CoreError)        │ │
//! │  │  SaveFailed     │  │  ShuttingDown   │  │  Database(DbError)      │ │
//! │  │  Invalid        │  │  ChannelError   │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Calculation failures reach callers as [`ApiError`](crate::calculator::ApiError);
//! `ServiceError` covers everything around them.

use customs_core::CoreError;
use customs_db::DbError;
use thiserror::Error;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read or parsed.
    #[error("Failed to load config: {0}")]
    LoadFailed(String),

    /// Config file could not be written.
    #[error("Failed to save config: {0}")]
    SaveFailed(String),

    /// A value failed validation.
    #[error("Invalid configuration for '{key}': {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::SaveFailed(err.to_string())
    }
}

/// Service error type.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Database(#[from] DbError),

    #[error(transparent)]
    Core(#[from] CoreError),

    /// No snapshot has been published yet.
    #[error("No rate snapshot has been loaded")]
    NoSnapshot,

    /// Request body is not valid JSON for the request shape.
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Request file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The refresh task has stopped.
    #[error("Rate refresher is shutting down")]
    ShuttingDown,

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::MalformedRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_message() {
        let err = ConfigError::invalid("refresh.interval_secs", "must be greater than 0");
        assert_eq!(
            err.to_string(),
            "Invalid configuration for 'refresh.interval_secs': must be greater than 0"
        );
    }

    #[test]
    fn test_conversions() {
        let err: ServiceError = CoreError::unsupported_currency("XYZ").into();
        assert!(matches!(err, ServiceError::Core(_)));

        let err: ServiceError = DbError::NoSchedule.into();
        assert_eq!(err.to_string(), "Storage error: No charge schedule stored");

        let err: ServiceError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, ServiceError::MalformedRequest(_)));
    }
}
