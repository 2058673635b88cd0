//! Error types for lazarus-core

use thiserror::Error;

/// Result type alias using lazarus-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for Lazarus
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Invalid configuration format
    #[error("Invalid configuration format: {message}")]
    InvalidConfig { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown recovery type
    #[error("Unknown recovery type: {value}. Valid types: rollback, failover, restore, emergency_stop, data_recovery, service_recovery, infrastructure_recovery")]
    InvalidRecoveryType { value: String },

    /// Illegal state machine transition on a recovery operation
    #[error("Invalid transition for operation {operation_id}: {from} -> {to}")]
    InvalidTransition {
        operation_id: String,
        from: String,
        to: String,
    },

    /// Step plan assigned twice
    #[error("Step plan for operation {operation_id} is already fixed")]
    PlanAlreadySet { operation_id: String },
}

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid recovery type error
    pub fn invalid_recovery_type(value: impl Into<String>) -> Self {
        Self::InvalidRecoveryType {
            value: value.into(),
        }
    }

    /// Create an invalid transition error
    pub fn invalid_transition(
        operation_id: impl Into<String>,
        from: impl ToString,
        to: impl ToString,
    ) -> Self {
        Self::InvalidTransition {
            operation_id: operation_id.into(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}
