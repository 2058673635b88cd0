//! # lazarus-backup
//!
//! Point-in-time artifacts for Lazarus:
//! - Database dumps through the configured dump tool
//! - Code and configuration snapshots (tar, optionally gzip)
//! - Streaming ChaCha20-Poly1305 encryption at rest with a single key
//! - SHA-256 sidecars checked before every restore

pub mod archive;
pub mod encryption;
pub mod error;
pub mod integrity;
pub mod manager;

pub use encryption::{BackupKey, FileEncryptor, KeyOrigin};
pub use error::{BackupError, Result};
pub use manager::{remove_artifact, BackupManager, PreparedArtifact};
