//! Error types for lazarus-recovery

use thiserror::Error;

/// Result type alias for recovery operations
pub type Result<T> = std::result::Result<T, RecoveryError>;

/// Failures of the recovery point store, locks and history
#[derive(Error, Debug)]
pub enum RecoveryError {
    /// Every persistence target rejected the write
    #[error("Recovery point store error: {0}")]
    Store(String),

    /// Points are immutable; a second write under the same key is refused
    #[error("Recovery point {key} already exists")]
    PointExists { key: String },

    /// An artifact for a new recovery point could not be produced
    #[error("Failed to capture recovery point: {0}")]
    Capture(String),

    #[error("Recovery point not found: {0}")]
    PointNotFound(String),

    #[error("Resource '{resource}' is locked by another recovery operation")]
    LockContention { resource: String },

    #[error("Operation history error: {0}")]
    History(String),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error(transparent)]
    Core(#[from] lazarus_core::Error),

    #[error(transparent)]
    Backup(#[from] lazarus_backup::BackupError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
