//! Directory snapshots as (optionally gzip-compressed) tar archives.

use crate::error::{BackupError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tar::Builder as TarBuilder;
use tracing::debug;
use walkdir::WalkDir;

/// Default compression level (6 = balanced speed/ratio).
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Regenerable or VCS-internal paths never included in a snapshot
pub const ALWAYS_EXCLUDE: &[&str] = &[
    "**/.git",
    "**/.git/**",
    "**/node_modules",
    "**/node_modules/**",
    "**/__pycache__",
    "**/__pycache__/**",
    "**/.venv",
    "**/.venv/**",
    "**/target",
    "**/target/**",
    "**/*.pyc",
];

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Outcome of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotStats {
    pub file_count: usize,
    /// Uncompressed bytes read from the source tree
    pub source_bytes: u64,
}

/// Compiled exclusion patterns
#[derive(Debug, Clone)]
pub struct Exclusions {
    globset: GlobSet,
}

impl Exclusions {
    pub fn new(additional: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        let patterns = ALWAYS_EXCLUDE
            .iter()
            .map(|p| p.to_string())
            .chain(additional.iter().cloned());

        for pattern in patterns {
            let glob = Glob::new(&pattern).map_err(|e| BackupError::Pattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            builder.add(glob);
        }

        let globset = builder.build().map_err(|e| BackupError::Pattern {
            pattern: "<set>".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { globset })
    }

    pub fn is_excluded(&self, relative: &Path) -> bool {
        self.globset.is_match(relative)
    }
}

/// Archive every file under `source` into `output`, paths relative to `source`.
pub fn create_snapshot(
    source: &Path,
    output: &Path,
    compress: bool,
    exclusions: &Exclusions,
) -> Result<SnapshotStats> {
    if !source.is_dir() {
        return Err(BackupError::SourceMissing {
            path: source.display().to_string(),
        });
    }

    let files = scan(source, exclusions)?;
    let writer = BufWriter::new(File::create(output)?);

    let stats = if compress {
        let encoder = GzEncoder::new(writer, Compression::new(DEFAULT_COMPRESSION_LEVEL));
        let (stats, encoder) = append_files(source, &files, encoder)?;
        encoder.finish()?.flush()?;
        stats
    } else {
        let (stats, mut writer) = append_files(source, &files, writer)?;
        writer.flush()?;
        stats
    };

    debug!(
        "Snapshot of {} written to {} ({} files)",
        source.display(),
        output.display(),
        stats.file_count
    );
    Ok(stats)
}

fn scan(source: &Path, exclusions: &Exclusions) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(source)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            let relative = e.path().strip_prefix(source).unwrap_or(e.path());
            relative.as_os_str().is_empty() || !exclusions.is_excluded(relative)
        })
    {
        let entry = entry?;
        if entry.file_type().is_file() {
            if let Ok(relative) = entry.path().strip_prefix(source) {
                files.push(relative.to_path_buf());
            }
        }
    }
    Ok(files)
}

fn append_files<W: Write>(
    source: &Path,
    files: &[PathBuf],
    writer: W,
) -> Result<(SnapshotStats, W)> {
    let mut tar = TarBuilder::new(writer);
    let mut stats = SnapshotStats {
        file_count: 0,
        source_bytes: 0,
    };

    for relative in files {
        let full = source.join(relative);
        stats.source_bytes += fs::metadata(&full)?.len();
        tar.append_path_with_name(&full, relative)?;
        stats.file_count += 1;
    }

    Ok((stats, tar.into_inner()?))
}

/// Unpack a snapshot into `destination`, overwriting existing files.
///
/// Compression is detected from the gzip signature. Returns the number of
/// entries unpacked.
pub fn extract_snapshot(archive: &Path, destination: &Path) -> Result<usize> {
    fs::create_dir_all(destination)?;

    let mut signature = [0u8; 2];
    let compressed = {
        let mut file = File::open(archive)?;
        file.read(&mut signature)? == 2 && signature == GZIP_MAGIC
    };

    let reader = BufReader::new(File::open(archive)?);
    if compressed {
        unpack(tar::Archive::new(GzDecoder::new(reader)), destination)
    } else {
        unpack(tar::Archive::new(reader), destination)
    }
}

fn unpack<R: Read>(mut archive: tar::Archive<R>, destination: &Path) -> Result<usize> {
    archive.set_overwrite(true);
    let mut count = 0;
    for entry in archive.entries()? {
        let mut entry = entry?;
        // unpack_in refuses paths escaping the destination
        if entry.unpack_in(destination)? {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn source_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let base = temp.path();
        fs::create_dir_all(base.join("src")).unwrap();
        fs::create_dir_all(base.join(".git/objects")).unwrap();
        fs::create_dir_all(base.join("web/node_modules/lib")).unwrap();
        fs::write(base.join("src/main.py"), "print('hi')").unwrap();
        fs::write(base.join("settings.yaml"), "debug: false").unwrap();
        fs::write(base.join(".git/objects/abc"), "blob").unwrap();
        fs::write(base.join("web/node_modules/lib/index.js"), "x").unwrap();
        temp
    }

    #[test]
    fn test_snapshot_excludes_vcs_and_dependencies() {
        let source = source_tree();
        let out = TempDir::new().unwrap();
        let archive = out.path().join("code.tar.gz");

        let stats =
            create_snapshot(source.path(), &archive, true, &Exclusions::new(&[]).unwrap()).unwrap();
        assert_eq!(stats.file_count, 2);

        let restored = TempDir::new().unwrap();
        let count = extract_snapshot(&archive, restored.path()).unwrap();
        assert_eq!(count, 2);
        assert!(restored.path().join("src/main.py").exists());
        assert!(!restored.path().join(".git").exists());
        assert!(!restored.path().join("web/node_modules").exists());
    }

    #[test]
    fn test_uncompressed_snapshot_extracts() {
        let source = source_tree();
        let out = TempDir::new().unwrap();
        let archive = out.path().join("config.tar");

        create_snapshot(source.path(), &archive, false, &Exclusions::new(&[]).unwrap()).unwrap();
        let restored = TempDir::new().unwrap();
        extract_snapshot(&archive, restored.path()).unwrap();

        assert_eq!(
            fs::read_to_string(restored.path().join("settings.yaml")).unwrap(),
            "debug: false"
        );
    }

    #[test]
    fn test_extract_overwrites_existing_files() {
        let source = source_tree();
        let out = TempDir::new().unwrap();
        let archive = out.path().join("code.tar.gz");
        create_snapshot(source.path(), &archive, true, &Exclusions::new(&[]).unwrap()).unwrap();

        fs::write(source.path().join("settings.yaml"), "debug: true").unwrap();
        extract_snapshot(&archive, source.path()).unwrap();
        assert_eq!(
            fs::read_to_string(source.path().join("settings.yaml")).unwrap(),
            "debug: false"
        );
    }

    #[test]
    fn test_missing_source_directory() {
        let out = TempDir::new().unwrap();
        let result = create_snapshot(
            Path::new("/nonexistent/lazarus-src"),
            &out.path().join("x.tar.gz"),
            true,
            &Exclusions::new(&[]).unwrap(),
        );
        assert!(matches!(result, Err(BackupError::SourceMissing { .. })));
    }

    #[test]
    fn test_additional_pattern() {
        let exclusions = Exclusions::new(&["**/*.log".to_string()]).unwrap();
        assert!(exclusions.is_excluded(Path::new("logs/app.log")));
        assert!(!exclusions.is_excluded(Path::new("src/app.py")));
    }
}
