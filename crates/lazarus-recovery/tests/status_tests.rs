//! Read-only status view

mod common;

use common::Harness;
use lazarus_core::types::{RecoveryStatus, RecoveryType};
use lazarus_recovery::StatusReader;
use std::fs;

#[tokio::test]
async fn test_status_on_fresh_root_creates_nothing() {
    let h = Harness::new();
    let report = StatusReader::new(&h.config).read(10).await;

    assert!(report.operations.is_empty());
    assert!(report.recovery_points.is_empty());
    assert!(report.warnings.is_empty());
    assert!(!h.config.key_path().exists());
    assert!(!h.config.backup_root().exists());
}

#[tokio::test]
async fn test_status_reports_persisted_state() {
    let h = Harness::new();
    let orchestrator = h.orchestrator();
    let point = orchestrator
        .create_recovery_point("v1.1.0", RecoveryType::Rollback)
        .await
        .unwrap();
    let op = orchestrator.execute_rollback("v1.1.0", None, false).await;
    assert_eq!(op.status(), RecoveryStatus::Completed, "{:?}", op.error_message());

    let report = StatusReader::new(&h.config).read(10).await;

    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    assert_eq!(report.operations.len(), 1);
    assert_eq!(report.operations[0].operation_id(), op.operation_id());
    assert!(report.recovery_points.iter().any(|p| p.key() == point.key()));
    assert!(!h.config.key_path().exists());
}

#[tokio::test]
async fn test_unreadable_history_becomes_a_warning() {
    let h = Harness::new();
    fs::create_dir_all(h.config.backup_root()).unwrap();
    fs::write(h.config.operations_dir(), "not a directory").unwrap();

    let report = StatusReader::new(&h.config).read(10).await;

    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("operation history"));
    assert!(report.operations.is_empty());
}
