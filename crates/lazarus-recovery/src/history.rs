//! Operation history: one JSON record per finished operation plus a bounded
//! in-memory list of recent operations

use crate::error::{RecoveryError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use lazarus_core::types::RecoveryOperation;
use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Persisted and in-memory record of finished operations
#[derive(Debug)]
pub struct OperationHistory {
    dir: Utf8PathBuf,
    limit: usize,
    recent: Mutex<VecDeque<RecoveryOperation>>,
}

impl OperationHistory {
    pub fn new(dir: impl Into<Utf8PathBuf>, limit: usize) -> Self {
        Self {
            dir: dir.into(),
            limit,
            recent: Mutex::new(VecDeque::new()),
        }
    }

    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    fn record_path(&self, operation_id: &str) -> Utf8PathBuf {
        self.dir.join(format!("{}.json", operation_id))
    }

    /// Record a terminal operation.
    ///
    /// The in-memory list is always updated; the persisted record is written
    /// exactly once and never overwritten.
    pub fn record(&self, operation: &RecoveryOperation) -> Result<()> {
        if !operation.is_terminal() {
            return Err(RecoveryError::History(format!(
                "operation {} is still {}",
                operation.operation_id(),
                operation.status()
            )));
        }

        {
            let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
            recent.push_back(operation.clone());
            while recent.len() > self.limit {
                recent.pop_front();
            }
        }

        fs::create_dir_all(&self.dir)?;
        let path = self.record_path(operation.operation_id());
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(RecoveryError::History(format!(
                    "operation {} already persisted",
                    operation.operation_id()
                )))
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(serde_json::to_string_pretty(operation)?.as_bytes())?;
        file.sync_all()?;
        debug!("Persisted operation record {}", path);
        Ok(())
    }

    /// Recent operations of this process, newest first
    pub fn recent(&self) -> Vec<RecoveryOperation> {
        let recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        recent.iter().rev().cloned().collect()
    }

    /// Persisted operations, newest first
    pub fn load(&self, limit: usize) -> Result<Vec<RecoveryOperation>> {
        let mut operations = self.read_all()?;
        operations.sort_by(|a, b| b.start_time().cmp(&a.start_time()));
        operations.truncate(limit);
        Ok(operations)
    }

    fn read_all(&self) -> Result<Vec<RecoveryOperation>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut operations = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read_to_string(&path)
                .map_err(RecoveryError::from)
                .and_then(|content| Ok(serde_json::from_str::<RecoveryOperation>(&content)?))
            {
                Ok(operation) => operations.push(operation),
                Err(e) => warn!("Skipping unreadable operation record {}: {}", path.display(), e),
            }
        }
        Ok(operations)
    }

    /// Remove persisted records that finished before `cutoff`.
    ///
    /// Returns the ids removed (or that would be, with `dry_run`).
    pub fn cleanup(&self, cutoff: DateTime<Utc>, dry_run: bool) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for operation in self.read_all()? {
            let finished = operation.end_time().unwrap_or(operation.start_time());
            if finished >= cutoff {
                continue;
            }
            if !dry_run {
                match fs::remove_file(self.record_path(operation.operation_id())) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => continue,
                    Err(e) => return Err(e.into()),
                }
                info!("Removed operation record {}", operation.operation_id());
            }
            removed.push(operation.operation_id().to_string());
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazarus_core::types::{RecoveryStatus, RecoveryType};
    use tempfile::TempDir;

    fn finished(id: &str) -> RecoveryOperation {
        let mut op = RecoveryOperation::new(id, RecoveryType::Restore);
        op.begin().unwrap();
        op.fail("boom").unwrap();
        op
    }

    fn history(limit: usize) -> (TempDir, OperationHistory) {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().join("operations")).unwrap();
        (temp, OperationHistory::new(dir, limit))
    }

    #[test]
    fn test_recent_list_is_capped() {
        let (_temp, history) = history(2);
        for id in ["a", "b", "c"] {
            history.record(&finished(id)).unwrap();
        }
        let recent: Vec<String> = history
            .recent()
            .iter()
            .map(|o| o.operation_id().to_string())
            .collect();
        assert_eq!(recent, vec!["c", "b"]);
        assert_eq!(history.load(10).unwrap().len(), 3);
    }

    #[test]
    fn test_record_written_once() {
        let (_temp, history) = history(10);
        let op = finished("once");
        history.record(&op).unwrap();
        assert!(history.record(&op).is_err());

        let loaded = history.load(10).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].status(), RecoveryStatus::Failed);
    }

    #[test]
    fn test_running_operation_rejected() {
        let (_temp, history) = history(10);
        let op = RecoveryOperation::new("running", RecoveryType::Failover);
        assert!(history.record(&op).is_err());
    }

    #[test]
    fn test_cleanup_respects_cutoff_and_dry_run() {
        let (_temp, history) = history(10);
        history.record(&finished("old")).unwrap();

        let future = Utc::now() + chrono::Duration::days(1);
        assert_eq!(history.cleanup(future, true).unwrap(), vec!["old"]);
        assert_eq!(history.load(10).unwrap().len(), 1);

        let past = Utc::now() - chrono::Duration::days(1);
        assert!(history.cleanup(past, false).unwrap().is_empty());

        assert_eq!(history.cleanup(future, false).unwrap(), vec!["old"]);
        assert!(history.cleanup(future, false).unwrap().is_empty());
    }
}
