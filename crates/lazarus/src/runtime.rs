//! Wiring of adapters, stores and the orchestrator from configuration

use crate::output;
use anyhow::{Context, Result};
use camino::Utf8Path;
use lazarus_adapters::{
    CommandTrafficAdapter, DockerAdapter, GitApplication, KubernetesAdapter, OrchestrationAdapter,
    PostgresAdapter, WebhookNotifier,
};
use lazarus_backup::BackupManager;
use lazarus_core::types::CacheConfig;
use lazarus_core::LazarusConfig;
use lazarus_health::SystemHealthMonitor;
use lazarus_recovery::{Adapters, CacheTarget, RecoveryOrchestrator, RecoveryPointStore, RedisCache};
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything a command needs to act on the protected system
pub struct Runtime {
    pub config: LazarusConfig,
    pub orchestrator: RecoveryOrchestrator,
    /// Set when a cache URL is configured but the cache could not be reached
    pub cache_error: Option<String>,
}

pub async fn init(config_path: Option<&Utf8Path>) -> Result<Runtime> {
    let config = LazarusConfig::load(config_path).context("Failed to load configuration")?;
    let settings = config.inner();

    let backup =
        BackupManager::new(config.clone()).context("Failed to initialize backup storage")?;
    if backup.key_provisioned() {
        output::warning(&format!(
            "Generated a new backup encryption key at {}",
            config.key_path()
        ));
        output::info("Keep a copy of this key offline; encrypted backups cannot be restored without it");
    }

    let orchestration: Option<Arc<dyn OrchestrationAdapter>> = if settings.kubernetes.enabled {
        debug!(
            "Kubernetes orchestration enabled (namespace {})",
            settings.kubernetes.namespace
        );
        Some(Arc::new(KubernetesAdapter::new(settings.kubernetes.clone())))
    } else {
        None
    };

    let adapters = Adapters {
        database: Arc::new(PostgresAdapter::new(settings.database.clone())),
        containers: Arc::new(DockerAdapter::new(settings.containers.clone())),
        orchestration,
        traffic: Arc::new(CommandTrafficAdapter::new(settings.traffic.clone())),
        application: Arc::new(GitApplication::new(settings.application.clone())?),
        notifier: Arc::new(WebhookNotifier::new(&settings.monitoring)?),
        snapshots: Arc::new(backup),
        health: Arc::new(SystemHealthMonitor::new()),
    };

    let (cache, cache_error) = connect_cache(&settings.cache).await;
    let store = RecoveryPointStore::new(
        config.recovery_points_dir(),
        cache,
        settings.storage.retention.clone(),
    );
    let orchestrator = RecoveryOrchestrator::new(&config, adapters, store);

    Ok(Runtime {
        config,
        orchestrator,
        cache_error,
    })
}

async fn connect_cache(config: &CacheConfig) -> (Option<Arc<dyn CacheTarget>>, Option<String>) {
    let Some(url) = config.url.as_deref() else {
        return (None, None);
    };

    match RedisCache::connect(url, &config.key_prefix).await {
        Ok(cache) => (Some(Arc::new(cache)), None),
        Err(e) => {
            let message = format!("{:#}", e);
            warn!(
                "Cache unavailable, recovery points are kept on disk only: {}",
                message
            );
            (None, Some(message))
        }
    }
}
