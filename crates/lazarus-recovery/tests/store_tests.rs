//! Recovery point store: retention, idempotent cleanup, immutability

mod common;

use camino::Utf8PathBuf;
use chrono::{Duration, Utc};
use common::Harness;
use lazarus_core::types::{
    HealthMetrics, RecoveryPoint, RecoveryType, RetentionPolicy, ServicesState,
};
use lazarus_recovery::{MemoryCache, RecoveryPointStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;

fn point_aged(days: i64, version: &str, artifact: Option<Utf8PathBuf>) -> RecoveryPoint {
    RecoveryPoint {
        timestamp: Utc::now() - Duration::days(days) - Duration::minutes(5),
        deployment_version: version.to_string(),
        database_backup_ref: artifact.map(|p| p.to_string()),
        code_snapshot_ref: None,
        config_snapshot_ref: None,
        services_state: ServicesState::default(),
        health_metrics: HealthMetrics::default(),
        recovery_type: RecoveryType::Rollback,
        metadata: BTreeMap::new(),
    }
}

fn scratch_store(temp: &TempDir) -> RecoveryPointStore {
    let dir = Utf8PathBuf::from_path_buf(temp.path().join("recovery_points")).unwrap();
    RecoveryPointStore::new(
        dir,
        Some(Arc::new(MemoryCache::new())),
        RetentionPolicy::default(),
    )
}

#[tokio::test]
async fn test_cleanup_keeps_exactly_the_retention_window() {
    let temp = TempDir::new().unwrap();
    let store = scratch_store(&temp);

    let ages = [0, 3, 12, 29, 31, 45, 90];
    for (i, age) in ages.iter().enumerate() {
        store
            .store(&point_aged(*age, &format!("v1.{}.0", i), None))
            .await
            .unwrap();
    }

    let report = store.cleanup(30, false).await.unwrap();
    assert_eq!(report.expired_points.len(), 3);

    let remaining = store.list_all().await.unwrap();
    let versions: Vec<&str> = remaining
        .iter()
        .map(|p| p.deployment_version.as_str())
        .collect();
    assert_eq!(versions, vec!["v1.0.0", "v1.1.0", "v1.2.0", "v1.3.0"]);
    for point in &remaining {
        assert!(point.timestamp >= Utc::now() - Duration::days(30));
    }
}

#[tokio::test]
async fn test_second_cleanup_is_a_noop() {
    let temp = TempDir::new().unwrap();
    let store = scratch_store(&temp);

    let artifact = Utf8PathBuf::from_path_buf(temp.path().join("old.dump.enc")).unwrap();
    std::fs::write(&artifact, b"ciphertext").unwrap();
    std::fs::write(format!("{}.sha256", artifact), b"digest").unwrap();

    store
        .store(&point_aged(60, "v0.9.0", Some(artifact.clone())))
        .await
        .unwrap();
    store.store(&point_aged(1, "v1.0.0", None)).await.unwrap();

    let first = store.cleanup(30, false).await.unwrap();
    assert_eq!(first.points_removed(), 1);
    assert_eq!(first.artifacts_removed, 1);
    assert!(!artifact.exists());

    let second = store.cleanup(30, false).await.unwrap();
    assert!(second.is_empty());
    assert_eq!(second.artifacts_removed, 0);
    assert_eq!(store.list_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_dry_run_deletes_nothing() {
    let temp = TempDir::new().unwrap();
    let store = scratch_store(&temp);
    store.store(&point_aged(60, "v0.9.0", None)).await.unwrap();

    let report = store.cleanup(30, true).await.unwrap();
    assert!(report.dry_run);
    assert_eq!(report.points_removed(), 1);
    assert_eq!(store.list_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_points_are_never_rewritten() {
    let h = Harness::new();
    let orchestrator = h.orchestrator();
    let point = orchestrator
        .create_recovery_point("v1.2.0", RecoveryType::Rollback)
        .await
        .unwrap();
    let record = h
        .config
        .recovery_points_dir()
        .join(format!("recovery_point_{}.json", point.key()));
    let original = std::fs::read(&record).unwrap();

    // Activity that creates more points and mutates infrastructure
    orchestrator.execute_rollback("v1.2.0", None, false).await;
    orchestrator
        .execute_disaster_recovery(RecoveryType::ServiceRecovery, None, false)
        .await;
    orchestrator.cleanup(false).await.unwrap();
    assert!(orchestrator.store().store(&point).await.is_err());

    assert_eq!(std::fs::read(&record).unwrap(), original);
    assert_eq!(
        orchestrator.store().get(&point.key()).await.unwrap(),
        Some(point)
    );
}

#[tokio::test]
async fn test_cleanup_reports_old_operation_records() {
    let h = Harness::new();
    let orchestrator = h.orchestrator();
    orchestrator.execute_rollback("v1.2.0", None, false).await;

    // Everything is inside the 30 day window
    let report = orchestrator.cleanup(true).await.unwrap();
    assert!(report.operations_removed.is_empty());
    assert_eq!(orchestrator.operation_history(10).unwrap().len(), 1);
}
