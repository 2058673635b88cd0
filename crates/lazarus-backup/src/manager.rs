//! Backup manager: produces, protects and restores point-in-time artifacts

use crate::archive::{self, Exclusions};
use crate::encryption::{self, FileEncryptor, KeyOrigin, ENCRYPTED_EXTENSION};
use crate::error::{BackupError, Result};
use crate::integrity;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use lazarus_core::types::{BackupCategory, BackupConfig};
use lazarus_core::LazarusConfig;
use std::fs;
use std::io;
use tempfile::TempDir;
use tokio::process::Command;
use tokio::task;
use tracing::{debug, info};

/// Creates database dumps and code/config snapshots under the backup root
#[derive(Debug, Clone)]
pub struct BackupManager {
    config: LazarusConfig,
    encryptor: Option<FileEncryptor>,
    key_origin: Option<KeyOrigin>,
    exclusions: Exclusions,
}

/// An artifact ready to be consumed by a restore.
///
/// For encrypted artifacts `path` points at a decrypted scratch copy that is
/// removed when this value is dropped.
#[derive(Debug)]
pub struct PreparedArtifact {
    path: Utf8PathBuf,
    _scratch: Option<TempDir>,
}

impl PreparedArtifact {
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl BackupManager {
    /// Build from configuration, loading (or provisioning) the encryption key
    /// when `storage.encryption` is enabled.
    pub fn new(config: LazarusConfig) -> Result<Self> {
        let storage = &config.inner().storage;
        let (encryptor, key_origin) = if storage.encryption {
            let (key, origin) =
                encryption::load_or_provision_key(&config.key_path(), storage.auto_generate_key)?;
            (Some(FileEncryptor::new(key)), Some(origin))
        } else {
            debug!("Artifact encryption disabled");
            (None, None)
        };

        Ok(Self {
            config,
            encryptor,
            key_origin,
            exclusions: Exclusions::new(&[])?,
        })
    }

    /// Build with an explicit encryptor, bypassing the key file
    pub fn with_encryptor(config: LazarusConfig, encryptor: Option<FileEncryptor>) -> Result<Self> {
        Ok(Self {
            config,
            encryptor,
            key_origin: None,
            exclusions: Exclusions::new(&[])?,
        })
    }

    /// True when this run created the encryption key
    pub fn key_provisioned(&self) -> bool {
        self.key_origin == Some(KeyOrigin::Generated)
    }

    pub fn encryption_enabled(&self) -> bool {
        self.encryptor.is_some()
    }

    pub fn config(&self) -> &LazarusConfig {
        &self.config
    }

    /// Dump the configured database into `database/`.
    ///
    /// A non-zero exit from the dump tool fails with its stderr attached. When
    /// encryption applies, the plaintext dump is replaced by `<dump>.enc`.
    pub async fn create_database_backup(&self, name: &str) -> Result<Utf8PathBuf> {
        let db = &self.config.inner().database;
        let policy = self.config.backup_config(BackupCategory::Database);
        let dir = self.config.category_dir(BackupCategory::Database);
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(artifact_name(name, "dump"));
        let mut args = vec![
            "-h".to_string(),
            db.host.clone(),
            "-p".to_string(),
            db.port.to_string(),
            "-U".to_string(),
            db.user.clone(),
            "-d".to_string(),
            db.name.clone(),
            "-F".to_string(),
            "c".to_string(),
            "-f".to_string(),
            path.to_string(),
        ];
        if !policy.compression {
            args.extend(["-Z".to_string(), "0".to_string()]);
        }

        let mut command = Command::new(&db.dump_tool);
        command.args(&args);
        if let Ok(password) = std::env::var(&db.password_env) {
            command.env("PGPASSWORD", password);
        }

        debug!("Running {} {}", db.dump_tool, args.join(" "));
        let output = command
            .output()
            .await
            .map_err(|source| BackupError::ToolUnavailable {
                tool: db.dump_tool.clone(),
                source,
            })?;

        if !output.status.success() {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(BackupError::DumpFailed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(BackupError::EmptyDump {
                path: path.to_string(),
            });
        }

        self.finalize(BackupCategory::Database, path).await
    }

    /// Archive the application code directory into `code_snapshots/`
    pub async fn create_code_snapshot(&self, name: &str) -> Result<Utf8PathBuf> {
        let source = self.config.inner().application.code_dir.clone();
        self.snapshot(BackupCategory::Code, source, name).await
    }

    /// Archive the application configuration directory into `config_snapshots/`
    pub async fn create_config_snapshot(&self, name: &str) -> Result<Utf8PathBuf> {
        let source = self.config.inner().application.config_dir.clone();
        self.snapshot(BackupCategory::Config, source, name).await
    }

    /// Unpack a code snapshot over the application code directory
    pub async fn restore_code_snapshot(&self, artifact: &Utf8Path) -> Result<usize> {
        let target = self.config.inner().application.code_dir.clone();
        self.restore_snapshot(BackupCategory::Code, artifact, target).await
    }

    /// Unpack a configuration snapshot over the configuration directory
    pub async fn restore_config_snapshot(&self, artifact: &Utf8Path) -> Result<usize> {
        let target = self.config.inner().application.config_dir.clone();
        self.restore_snapshot(BackupCategory::Config, artifact, target).await
    }

    /// Verify and, if needed, decrypt a database dump for the restore tool
    pub async fn prepare_database_restore(&self, artifact: &Utf8Path) -> Result<PreparedArtifact> {
        self.prepare(BackupCategory::Database, artifact).await
    }

    async fn snapshot(
        &self,
        category: BackupCategory,
        source: Utf8PathBuf,
        name: &str,
    ) -> Result<Utf8PathBuf> {
        let policy = self.config.backup_config(category);
        let dir = self.config.category_dir(category);
        tokio::fs::create_dir_all(&dir).await?;

        let extension = if policy.compression { "tar.gz" } else { "tar" };
        let path = dir.join(artifact_name(name, extension));
        let compress = policy.compression;
        let exclusions = self.exclusions.clone();
        let output = path.clone();

        let stats = task::spawn_blocking(move || {
            archive::create_snapshot(
                source.as_std_path(),
                output.as_std_path(),
                compress,
                &exclusions,
            )
        })
        .await??;
        debug!("{} snapshot captured {} files", category, stats.file_count);

        self.finalize(category, path).await
    }

    async fn restore_snapshot(
        &self,
        category: BackupCategory,
        artifact: &Utf8Path,
        target: Utf8PathBuf,
    ) -> Result<usize> {
        let prepared = self.prepare(category, artifact).await?;
        let count = task::spawn_blocking(move || {
            archive::extract_snapshot(prepared.path().as_std_path(), target.as_std_path())
        })
        .await??;
        info!("Restored {} entries from {}", count, artifact);
        Ok(count)
    }

    /// Enforce the size ceiling, encrypt and checksum a freshly written file
    async fn finalize(&self, category: BackupCategory, plain: Utf8PathBuf) -> Result<Utf8PathBuf> {
        let policy = self.config.backup_config(category).clone();
        let encryptor = if policy.encryption {
            self.encryptor.clone()
        } else {
            None
        };

        let artifact = task::spawn_blocking(move || finalize_blocking(plain, &policy, encryptor))
            .await??;
        info!("Created {} backup {}", category, artifact);
        Ok(artifact)
    }

    async fn prepare(&self, category: BackupCategory, artifact: &Utf8Path) -> Result<PreparedArtifact> {
        let verify = self.config.backup_config(category).verify_integrity;
        let encryptor = self.encryptor.clone();
        let artifact = artifact.to_owned();
        task::spawn_blocking(move || prepare_blocking(artifact, verify, encryptor)).await?
    }
}

fn finalize_blocking(
    plain: Utf8PathBuf,
    policy: &BackupConfig,
    encryptor: Option<FileEncryptor>,
) -> Result<Utf8PathBuf> {
    let size = fs::metadata(&plain)?.len();
    if size > policy.max_size_bytes {
        let _ = fs::remove_file(&plain);
        return Err(BackupError::TooLarge {
            path: plain.to_string(),
            size,
            limit: policy.max_size_bytes,
        });
    }

    let artifact = match encryptor {
        Some(encryptor) => {
            let sealed = Utf8PathBuf::from(format!("{}.{}", plain, ENCRYPTED_EXTENSION));
            let result = encryptor.encrypt_file(plain.as_std_path(), sealed.as_std_path());
            // Plaintext never outlives this call
            fs::remove_file(&plain)?;
            result?;
            sealed
        }
        None => plain,
    };

    if policy.verify_integrity {
        integrity::write_sidecar(artifact.as_std_path())?;
    }
    Ok(artifact)
}

fn prepare_blocking(
    artifact: Utf8PathBuf,
    verify: bool,
    encryptor: Option<FileEncryptor>,
) -> Result<PreparedArtifact> {
    if !artifact.exists() {
        return Err(BackupError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("artifact not found: {}", artifact),
        )));
    }

    if verify {
        integrity::verify_sidecar(artifact.as_std_path())?;
    } else {
        debug!("Integrity verification disabled for {}", artifact);
    }

    if !encryption::is_encrypted(artifact.as_std_path())? {
        return Ok(PreparedArtifact {
            path: artifact,
            _scratch: None,
        });
    }

    let encryptor = encryptor.ok_or_else(|| {
        BackupError::Key(format!("{} is encrypted but no key is loaded", artifact))
    })?;

    let scratch = tempfile::tempdir()?;
    let file_name = artifact
        .file_name()
        .map(|n| n.trim_end_matches(&format!(".{}", ENCRYPTED_EXTENSION)).to_string())
        .unwrap_or_else(|| "artifact".to_string());
    let path = Utf8PathBuf::try_from(scratch.path().join(file_name))
        .map_err(|e| BackupError::Io(io::Error::new(io::ErrorKind::InvalidData, e.to_string())))?;

    encryptor.decrypt_file(artifact.as_std_path(), path.as_std_path())?;
    Ok(PreparedArtifact {
        path,
        _scratch: Some(scratch),
    })
}

/// Delete an artifact and its checksum sidecar. Returns whether the artifact existed.
pub fn remove_artifact(path: &Utf8Path) -> io::Result<bool> {
    let existed = match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => return Err(e),
    };
    match fs::remove_file(integrity::sidecar_path(path.as_std_path())) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    Ok(existed)
}

/// `<name>_<yyyymmdd_HHMMSS_micros>.<extension>` with `name` reduced to safe characters
fn artifact_name(name: &str, extension: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let safe = if safe.is_empty() { "backup".to_string() } else { safe };
    format!("{}_{}.{}", safe, Utc::now().format("%Y%m%d_%H%M%S_%6f"), extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_name_sanitizes() {
        let name = artifact_name("pre rollback/v1.2", "dump");
        assert!(name.starts_with("pre_rollback_v1.2_"));
        assert!(name.ends_with(".dump"));
    }

    #[test]
    fn test_artifact_name_empty() {
        assert!(artifact_name("", "tar").starts_with("backup_"));
    }
}
