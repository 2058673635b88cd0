//! SHA-256 sidecar checksums for artifacts

use crate::error::{BackupError, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// Extension of the checksum sidecar
pub const CHECKSUM_EXTENSION: &str = "sha256";

/// Calculates SHA256 checksum of a file.
pub fn calculate_checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// `<artifact>.sha256`
pub fn sidecar_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.as_os_str().to_owned();
    name.push(".");
    name.push(CHECKSUM_EXTENSION);
    PathBuf::from(name)
}

/// Write the sidecar in `sha256sum` format and return the digest
pub fn write_sidecar(artifact: &Path) -> Result<String> {
    let checksum = calculate_checksum(artifact)?;
    let file_name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    fs::write(sidecar_path(artifact), format!("{}  {}\n", checksum, file_name))?;
    Ok(checksum)
}

/// Check an artifact against its sidecar. A missing sidecar fails the check.
pub fn verify_sidecar(artifact: &Path) -> Result<()> {
    let sidecar = sidecar_path(artifact);
    let content = match fs::read_to_string(&sidecar) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(BackupError::ChecksumMissing {
                path: artifact.display().to_string(),
            })
        }
        Err(e) => return Err(e.into()),
    };

    let expected = content.split_whitespace().next().unwrap_or_default();
    let actual = calculate_checksum(artifact)?;
    if !expected.eq_ignore_ascii_case(&actual) {
        return Err(BackupError::ChecksumMismatch {
            path: artifact.display().to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_known_digest() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.txt");
        fs::write(&path, "abc").unwrap();
        assert_eq!(
            calculate_checksum(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sidecar_detects_modification() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("db.dump.enc");
        fs::write(&path, "payload").unwrap();

        write_sidecar(&path).unwrap();
        assert!(sidecar_path(&path).ends_with("db.dump.enc.sha256"));
        verify_sidecar(&path).unwrap();

        fs::write(&path, "tampered").unwrap();
        assert!(matches!(
            verify_sidecar(&path),
            Err(BackupError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_sidecar_fails_verification() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("x");
        fs::write(&path, "x").unwrap();
        assert!(matches!(
            verify_sidecar(&path),
            Err(BackupError::ChecksumMissing { .. })
        ));
    }
}
