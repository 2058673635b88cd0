//! Error types for lazarus-backup

use thiserror::Error;

/// Result type alias for backup operations
pub type Result<T> = std::result::Result<T, BackupError>;

/// Failures while producing, protecting or restoring backup artifacts
#[derive(Error, Debug)]
pub enum BackupError {
    /// The dump tool ran and exited non-zero; carries its raw stderr
    #[error("Database dump failed (exit code {code:?}): {stderr}")]
    DumpFailed { code: Option<i32>, stderr: String },

    /// The external tool could not be spawned at all
    #[error("Failed to run '{tool}': {source}")]
    ToolUnavailable {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The dump tool succeeded but left nothing behind
    #[error("Dump tool produced no output at {path}")]
    EmptyDump { path: String },

    #[error("Artifact {path} is {size} bytes, above the {limit} byte ceiling")]
    TooLarge { path: String, size: u64, limit: u64 },

    #[error("Source directory not found: {path}")]
    SourceMissing { path: String },

    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Authentication failed, the header is wrong or the stream is truncated
    #[error("Decryption failed for {path}: {message}")]
    Decryption { path: String, message: String },

    #[error("Encryption key error: {0}")]
    Key(String),

    /// No key on disk and provisioning is disabled
    #[error("No encryption key at {path}; create one or set storage.auto_generate_key")]
    KeyMissing { path: String },

    #[error("No checksum sidecar for {path}; refusing to restore an unverified artifact")]
    ChecksumMissing { path: String },

    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid exclusion pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("Failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackupError {
    pub fn decryption(path: impl std::fmt::Display, message: impl Into<String>) -> Self {
        Self::Decryption {
            path: path.to_string(),
            message: message.into(),
        }
    }
}
