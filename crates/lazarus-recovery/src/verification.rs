//! Post-execution verification checks

use crate::context::Adapters;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationCheck {
    /// Every service reports healthy (and at least one exists)
    ServiceHealth,
    DatabaseConnectivity,
    ApplicationResponsive,
    /// No services remain running
    ServicesStopped,
    /// No client holds a database connection
    DatabaseConnectionsClosed,
    /// No failed workloads and every rollout available
    WorkloadsHealthy,
}

impl VerificationCheck {
    pub const ROLLBACK: [VerificationCheck; 3] = [
        VerificationCheck::ServiceHealth,
        VerificationCheck::DatabaseConnectivity,
        VerificationCheck::ApplicationResponsive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationCheck::ServiceHealth => "service_health",
            VerificationCheck::DatabaseConnectivity => "database_connectivity",
            VerificationCheck::ApplicationResponsive => "application_responsive",
            VerificationCheck::ServicesStopped => "services_stopped",
            VerificationCheck::DatabaseConnectionsClosed => "database_connections_closed",
            VerificationCheck::WorkloadsHealthy => "workloads_healthy",
        }
    }

    async fn evaluate(&self, adapters: &Adapters) -> Result<bool> {
        match self {
            VerificationCheck::ServiceHealth => {
                let services = adapters.containers.service_health().await?;
                Ok(!services.is_empty() && services.iter().all(|s| s.healthy))
            }
            VerificationCheck::DatabaseConnectivity => {
                adapters.database.ping().await?;
                Ok(true)
            }
            VerificationCheck::ApplicationResponsive => adapters.application.health_check().await,
            VerificationCheck::ServicesStopped => {
                Ok(adapters.containers.list_services().await?.is_empty())
            }
            VerificationCheck::DatabaseConnectionsClosed => {
                Ok(adapters.database.active_connections().await? == 0)
            }
            VerificationCheck::WorkloadsHealthy => {
                let Some(orchestration) = &adapters.orchestration else {
                    return Err(anyhow!("no orchestration platform configured"));
                };
                Ok(orchestration.failed_workloads().await?.is_empty()
                    && orchestration.rollout_complete().await?)
            }
        }
    }

    /// Run the check; adapter errors and the deadline both count as a failure
    pub async fn run(&self, adapters: &Adapters, deadline: Instant) -> bool {
        match tokio::time::timeout_at(deadline, self.evaluate(adapters)).await {
            Ok(Ok(passed)) => {
                debug!("Verification {}: {}", self, passed);
                passed
            }
            Ok(Err(e)) => {
                warn!("Verification {} errored: {:#}", self, e);
                false
            }
            Err(_) => {
                warn!("Verification {} timed out", self);
                false
            }
        }
    }
}

impl fmt::Display for VerificationCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run checks in order against a shared deadline
pub async fn run_checks(
    checks: &[VerificationCheck],
    adapters: &Adapters,
    deadline: Instant,
) -> Vec<(VerificationCheck, bool)> {
    let mut results = Vec::with_capacity(checks.len());
    for check in checks {
        results.push((*check, check.run(adapters, deadline).await));
    }
    results
}
