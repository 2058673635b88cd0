//! Read-only view of persisted recovery state.
//!
//! Opens the recovery point records and operation history under the backup
//! root without touching adapters, locks or the encryption key. Nothing here
//! creates or modifies a file.

use crate::history::OperationHistory;
use crate::store::RecoveryPointStore;
use lazarus_core::types::{RecoveryOperation, RecoveryPoint};
use lazarus_core::LazarusConfig;
use serde::Serialize;
use tracing::debug;

/// What `status` reports; read failures become warnings
#[derive(Debug, Default, Serialize)]
pub struct StatusReport {
    pub operations: Vec<RecoveryOperation>,
    pub recovery_points: Vec<RecoveryPoint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

pub struct StatusReader {
    store: RecoveryPointStore,
    history: OperationHistory,
    retention_days: u32,
}

impl StatusReader {
    /// File records only; the cache is never contacted
    pub fn new(config: &LazarusConfig) -> Self {
        let inner = config.inner();
        Self {
            store: RecoveryPointStore::new(
                config.recovery_points_dir(),
                None,
                inner.storage.retention.clone(),
            ),
            history: OperationHistory::new(config.operations_dir(), inner.recovery.history_limit),
            retention_days: inner.storage.retention.days,
        }
    }

    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    /// Newest `limit` operations and the points inside the retention window
    pub async fn read(&self, limit: usize) -> StatusReport {
        let mut report = StatusReport::default();

        match self.history.load(limit) {
            Ok(operations) => report.operations = operations,
            Err(e) => report
                .warnings
                .push(format!("Could not read operation history: {}", e)),
        }
        match self.store.list_since(self.retention_days).await {
            Ok(points) => report.recovery_points = points,
            Err(e) => report
                .warnings
                .push(format!("Could not read recovery points: {}", e)),
        }

        debug!(
            "Status read {} operations and {} recovery points",
            report.operations.len(),
            report.recovery_points.len()
        );
        report
    }
}
