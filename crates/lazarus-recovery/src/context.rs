//! Collaborators handed to the orchestrator at construction

use anyhow::Result;
use async_trait::async_trait;
use camino::Utf8Path;
use lazarus_adapters::{
    ApplicationAdapter, ContainerAdapter, DatabaseAdapter, NotificationAdapter,
    OrchestrationAdapter, TrafficAdapter,
};
use lazarus_backup::BackupManager;
use lazarus_health::{HealthMetrics, HealthSource};
use std::sync::Arc;
use tracing::warn;

/// Produces and restores the artifacts a recovery point refers to.
///
/// References are opaque strings (artifact paths for [`BackupManager`]).
#[async_trait]
pub trait Snapshotter: Send + Sync {
    async fn create_database_backup(&self, name: &str) -> Result<String>;

    async fn create_code_snapshot(&self, name: &str) -> Result<String>;

    async fn create_config_snapshot(&self, name: &str) -> Result<String>;

    /// Restore the database from `artifact` through `database`
    async fn restore_database(&self, artifact: &str, database: &dyn DatabaseAdapter) -> Result<()>;

    async fn restore_code(&self, artifact: &str) -> Result<()>;

    async fn restore_config(&self, artifact: &str) -> Result<()>;
}

#[async_trait]
impl Snapshotter for BackupManager {
    async fn create_database_backup(&self, name: &str) -> Result<String> {
        let path = BackupManager::create_database_backup(self, name).await?;
        Ok(path.into_string())
    }

    async fn create_code_snapshot(&self, name: &str) -> Result<String> {
        let path = BackupManager::create_code_snapshot(self, name).await?;
        Ok(path.into_string())
    }

    async fn create_config_snapshot(&self, name: &str) -> Result<String> {
        let path = BackupManager::create_config_snapshot(self, name).await?;
        Ok(path.into_string())
    }

    async fn restore_database(&self, artifact: &str, database: &dyn DatabaseAdapter) -> Result<()> {
        // Scratch plaintext lives until `prepared` is dropped
        let prepared = self.prepare_database_restore(Utf8Path::new(artifact)).await?;
        database.restore(prepared.path()).await
    }

    async fn restore_code(&self, artifact: &str) -> Result<()> {
        self.restore_code_snapshot(Utf8Path::new(artifact)).await?;
        Ok(())
    }

    async fn restore_config(&self, artifact: &str) -> Result<()> {
        self.restore_config_snapshot(Utf8Path::new(artifact)).await?;
        Ok(())
    }
}

/// Every external collaborator of the orchestrator
#[derive(Clone)]
pub struct Adapters {
    pub database: Arc<dyn DatabaseAdapter>,
    pub containers: Arc<dyn ContainerAdapter>,
    /// Absent when no orchestration platform is in use
    pub orchestration: Option<Arc<dyn OrchestrationAdapter>>,
    pub traffic: Arc<dyn TrafficAdapter>,
    pub application: Arc<dyn ApplicationAdapter>,
    pub notifier: Arc<dyn NotificationAdapter>,
    pub snapshots: Arc<dyn Snapshotter>,
    pub health: Arc<dyn HealthSource>,
}

impl Adapters {
    /// Sample host health off the async runtime
    pub async fn collect_health(&self) -> HealthMetrics {
        let source = Arc::clone(&self.health);
        match tokio::task::spawn_blocking(move || source.collect_health_metrics()).await {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!("Health sampling task failed: {}", e);
                HealthMetrics {
                    error: Some(format!("health sampling task failed: {}", e)),
                    ..Default::default()
                }
            }
        }
    }
}
