//! Named, file-based exclusive locks over shared infrastructure
//!
//! One lock file per resource under `<backup_root>/locks/`. Locks are taken in
//! sorted order so two operations with overlapping resource sets cannot
//! deadlock, and are released when the guard is dropped.

use crate::error::{RecoveryError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use fs4::fs_std::FileExt;
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use tracing::debug;

/// Infrastructure a recovery operation may mutate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Resource {
    ApplicationCode,
    Configuration,
    Database,
    Monitoring,
    Orchestration,
    Services,
    Traffic,
}

impl Resource {
    pub const ALL: [Resource; 7] = [
        Resource::ApplicationCode,
        Resource::Configuration,
        Resource::Database,
        Resource::Monitoring,
        Resource::Orchestration,
        Resource::Services,
        Resource::Traffic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::ApplicationCode => "application_code",
            Resource::Configuration => "configuration",
            Resource::Database => "database",
            Resource::Monitoring => "monitoring",
            Resource::Orchestration => "orchestration",
            Resource::Services => "services",
            Resource::Traffic => "traffic",
        }
    }
}

/// Lock directory
#[derive(Debug, Clone)]
pub struct ResourceLocks {
    dir: Utf8PathBuf,
}

/// Held locks; dropping releases them
#[derive(Debug)]
pub struct LockGuard {
    held: Vec<(Resource, File)>,
}

impl LockGuard {
    pub fn resources(&self) -> Vec<Resource> {
        self.held.iter().map(|(r, _)| *r).collect()
    }
}

impl ResourceLocks {
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Take every lock in `resources` without waiting.
    ///
    /// Fails on the first contended resource; locks already taken are
    /// released before returning.
    pub fn try_acquire(&self, resources: &[Resource], owner: &str) -> Result<LockGuard> {
        fs::create_dir_all(&self.dir)?;

        let ordered: BTreeSet<Resource> = resources.iter().copied().collect();
        let mut held = Vec::with_capacity(ordered.len());

        for resource in ordered {
            let path = self.dir.join(format!("{}.lock", resource.as_str()));
            let mut file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&path)?;

            if !FileExt::try_lock_exclusive(&file)? {
                return Err(RecoveryError::LockContention {
                    resource: resource.as_str().to_string(),
                });
            }

            // Owner is informational only; the lock is the flock itself
            file.set_len(0)?;
            writeln!(file, "{}", owner)?;
            debug!("Locked {} for {}", resource.as_str(), owner);
            held.push((resource, file));
        }

        Ok(LockGuard { held })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn locks() -> (TempDir, ResourceLocks) {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().join("locks")).unwrap();
        (temp, ResourceLocks::new(dir))
    }

    #[test]
    fn test_overlapping_sets_contend() {
        let (_temp, locks) = locks();
        let _first = locks
            .try_acquire(&[Resource::Services, Resource::Database], "op-1")
            .unwrap();

        let result = locks.try_acquire(&[Resource::Traffic, Resource::Database], "op-2");
        match result {
            Err(RecoveryError::LockContention { resource }) => assert_eq!(resource, "database"),
            other => panic!("expected contention, got {:?}", other),
        }
    }

    #[test]
    fn test_disjoint_sets_coexist() {
        let (_temp, locks) = locks();
        let _a = locks.try_acquire(&[Resource::Database], "op-1").unwrap();
        let _b = locks.try_acquire(&[Resource::Traffic], "op-2").unwrap();
    }

    #[test]
    fn test_drop_releases() {
        let (_temp, locks) = locks();
        let guard = locks.try_acquire(&[Resource::Services], "op-1").unwrap();
        assert_eq!(guard.resources(), vec![Resource::Services]);
        drop(guard);
        assert!(locks.try_acquire(&[Resource::Services], "op-2").is_ok());
    }

    #[test]
    fn test_failed_acquire_releases_partial_set() {
        let (_temp, locks) = locks();
        let blocker = locks.try_acquire(&[Resource::Traffic], "op-1").unwrap();
        assert!(locks
            .try_acquire(&[Resource::Database, Resource::Traffic], "op-2")
            .is_err());
        drop(blocker);
        // database was taken then released when the second acquire failed
        assert!(locks.try_acquire(&[Resource::Database], "op-3").is_ok());
    }
}
