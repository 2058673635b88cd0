//! Connectivity checks for the `health` command

use crate::context::Adapters;
use crate::store::RecoveryPointStore;
use anyhow::{Context, Result};
use camino::Utf8Path;
use futures::future::{join_all, BoxFuture, FutureExt};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

const CHECK_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckState {
    Ok,
    Failed,
    /// Not configured
    Skipped,
}

/// Result of one connectivity check
#[derive(Debug, Clone, Serialize)]
pub struct ConnectivityCheck {
    pub name: &'static str,
    pub state: CheckState,
    pub detail: String,
}

impl ConnectivityCheck {
    pub fn is_failure(&self) -> bool {
        self.state == CheckState::Failed
    }

    fn skipped(name: &'static str, detail: &str) -> Self {
        Self {
            name,
            state: CheckState::Skipped,
            detail: detail.to_string(),
        }
    }
}

async fn timed_check<F>(name: &'static str, check: F) -> ConnectivityCheck
where
    F: Future<Output = Result<String>>,
{
    let (state, detail) = match tokio::time::timeout(CHECK_TIMEOUT, check).await {
        Ok(Ok(detail)) => (CheckState::Ok, detail),
        Ok(Err(e)) => (CheckState::Failed, format!("{:#}", e)),
        Err(_) => (
            CheckState::Failed,
            format!("timed out after {}s", CHECK_TIMEOUT.as_secs()),
        ),
    };
    debug!("Connectivity {}: {:?} {}", name, state, detail);
    ConnectivityCheck {
        name,
        state,
        detail,
    }
}

/// Check every configured dependency concurrently
pub async fn check_connectivity(
    adapters: &Adapters,
    store: &RecoveryPointStore,
    backup_root: &Utf8Path,
) -> Vec<ConnectivityCheck> {
    let mut checks: Vec<BoxFuture<'_, ConnectivityCheck>> = vec![
        timed_check("database", async {
            adapters.database.ping().await?;
            let connections = adapters.database.active_connections().await?;
            Ok(format!("{} active connections", connections))
        })
        .boxed(),
        timed_check("container_runtime", async {
            let services = adapters.containers.list_services().await?;
            Ok(format!("{} running services", services.len()))
        })
        .boxed(),
        timed_check("backup_storage", check_storage(backup_root)).boxed(),
    ];

    checks.push(match store.cache_name() {
        Some(name) => timed_check("cache", async move {
            if let Some(result) = store.ping_cache().await {
                result?;
            }
            Ok(format!("{} reachable", name))
        })
        .boxed(),
        None => async { ConnectivityCheck::skipped("cache", "no cache configured") }.boxed(),
    });

    checks.push(match &adapters.orchestration {
        Some(orchestration) => timed_check("orchestration", async move {
            orchestration.ping().await?;
            Ok("reachable".to_string())
        })
        .boxed(),
        None => async { ConnectivityCheck::skipped("orchestration", "not enabled") }.boxed(),
    });

    join_all(checks).await
}

/// The backup root exists (or can be created) and accepts writes
async fn check_storage(backup_root: &Utf8Path) -> Result<String> {
    tokio::fs::create_dir_all(backup_root)
        .await
        .with_context(|| format!("Cannot create {}", backup_root))?;
    let marker = backup_root.join(format!(".lazarus-health-{}", uuid::Uuid::new_v4().simple()));
    tokio::fs::write(&marker, b"ok")
        .await
        .with_context(|| format!("{} is not writable", backup_root))?;
    tokio::fs::remove_file(&marker).await?;
    Ok(format!("{} writable", backup_root))
}
