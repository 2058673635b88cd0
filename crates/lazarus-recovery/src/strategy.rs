//! Disaster-recovery strategies, one per recovery type

use crate::context::Adapters;
use crate::lock::Resource;
use crate::verification::VerificationCheck;
use anyhow::{anyhow, Context};
use lazarus_adapters::StopMode;
use lazarus_core::types::{RecoveryOperation, RecoveryPoint, RecoveryType};
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

/// Outcome of one strategy action, or of a whole strategy
pub type StepResult = anyhow::Result<()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisasterStrategy {
    /// Return to the newest usable recovery point through the rollback plan
    Rollback,
    Failover,
    Restore,
    EmergencyStop,
    DataRecovery,
    ServiceRecovery,
    InfrastructureRecovery,
}

/// The recovery point a strategy needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointRequirement {
    /// Any point with at least one artifact
    AnyArtifact,
    /// A point carrying a database backup
    DatabaseBackup,
}

impl PointRequirement {
    pub fn is_met_by(&self, point: &RecoveryPoint) -> bool {
        match self {
            PointRequirement::AnyArtifact => point.artifact_refs().next().is_some(),
            PointRequirement::DatabaseBackup => point.has_database_backup(),
        }
    }
}

impl fmt::Display for PointRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointRequirement::AnyArtifact => write!(f, "a recovery point with backup artifacts"),
            PointRequirement::DatabaseBackup => write!(f, "a recovery point with a database backup"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisasterAction {
    ActivateStandbyDatabase,
    SwitchTrafficToBackup,
    UpdateDns,
    WaitForPropagation,
    StopServicesGracefully,
    StopServicesImmediately,
    CloseDatabaseConnections,
    EnterEmergencyState,
    RestoreDatabase,
    RestoreCode,
    RestoreConfiguration,
    StartServices,
    RestartUnhealthyServices,
    RestartFailedWorkloads,
    AwaitRollout,
}

/// Mutable state shared by the actions of one strategy run
pub struct StrategyContext<'a> {
    pub adapters: &'a Adapters,
    pub operation: &'a mut RecoveryOperation,
    pub point: Option<&'a RecoveryPoint>,
    pub propagation_wait: Duration,
}

impl<'a> StrategyContext<'a> {
    fn point(&self) -> anyhow::Result<&'a RecoveryPoint> {
        self.point.ok_or_else(|| anyhow!("no recovery point resolved"))
    }
}

impl DisasterStrategy {
    pub fn for_type(recovery_type: RecoveryType) -> Self {
        match recovery_type {
            RecoveryType::Rollback => DisasterStrategy::Rollback,
            RecoveryType::Failover => DisasterStrategy::Failover,
            RecoveryType::Restore => DisasterStrategy::Restore,
            RecoveryType::EmergencyStop => DisasterStrategy::EmergencyStop,
            RecoveryType::DataRecovery => DisasterStrategy::DataRecovery,
            RecoveryType::ServiceRecovery => DisasterStrategy::ServiceRecovery,
            RecoveryType::InfrastructureRecovery => DisasterStrategy::InfrastructureRecovery,
        }
    }

    pub fn recovery_type(&self) -> RecoveryType {
        match self {
            DisasterStrategy::Rollback => RecoveryType::Rollback,
            DisasterStrategy::Failover => RecoveryType::Failover,
            DisasterStrategy::Restore => RecoveryType::Restore,
            DisasterStrategy::EmergencyStop => RecoveryType::EmergencyStop,
            DisasterStrategy::DataRecovery => RecoveryType::DataRecovery,
            DisasterStrategy::ServiceRecovery => RecoveryType::ServiceRecovery,
            DisasterStrategy::InfrastructureRecovery => RecoveryType::InfrastructureRecovery,
        }
    }

    /// Actions in execution order. Rollback has none of its own: it runs
    /// the fixed rollback plan.
    pub fn actions(&self) -> &'static [DisasterAction] {
        use DisasterAction::*;
        match self {
            DisasterStrategy::Rollback => &[],
            DisasterStrategy::Failover => &[
                ActivateStandbyDatabase,
                SwitchTrafficToBackup,
                UpdateDns,
                WaitForPropagation,
            ],
            DisasterStrategy::Restore => &[
                StopServicesGracefully,
                RestoreDatabase,
                RestoreCode,
                RestoreConfiguration,
                StartServices,
            ],
            DisasterStrategy::EmergencyStop => &[
                StopServicesImmediately,
                CloseDatabaseConnections,
                EnterEmergencyState,
            ],
            DisasterStrategy::DataRecovery => &[CloseDatabaseConnections, RestoreDatabase],
            DisasterStrategy::ServiceRecovery => {
                &[RestartUnhealthyServices, RestartFailedWorkloads]
            }
            DisasterStrategy::InfrastructureRecovery => {
                &[StartServices, RestartFailedWorkloads, AwaitRollout]
            }
        }
    }

    pub fn verification_checks(&self, has_orchestration: bool) -> Vec<VerificationCheck> {
        use VerificationCheck::*;
        match self {
            DisasterStrategy::Rollback => VerificationCheck::ROLLBACK.to_vec(),
            DisasterStrategy::Failover | DisasterStrategy::Restore => {
                vec![DatabaseConnectivity, ApplicationResponsive, ServiceHealth]
            }
            DisasterStrategy::EmergencyStop => vec![ServicesStopped, DatabaseConnectionsClosed],
            DisasterStrategy::DataRecovery => vec![DatabaseConnectivity, ApplicationResponsive],
            DisasterStrategy::ServiceRecovery => {
                let mut checks = vec![ServiceHealth, ApplicationResponsive];
                if has_orchestration {
                    checks.push(WorkloadsHealthy);
                }
                checks
            }
            DisasterStrategy::InfrastructureRecovery => {
                let mut checks = vec![ServiceHealth, DatabaseConnectivity];
                if has_orchestration {
                    checks.push(WorkloadsHealthy);
                }
                checks
            }
        }
    }

    /// Resources locked for the duration of the strategy
    pub fn resources(&self) -> &'static [Resource] {
        use Resource::*;
        match self {
            DisasterStrategy::Rollback => &Resource::ALL,
            DisasterStrategy::Failover => &[Database, Traffic],
            DisasterStrategy::Restore => &[ApplicationCode, Configuration, Database, Services],
            DisasterStrategy::EmergencyStop => &[Database, Monitoring, Services],
            DisasterStrategy::DataRecovery => &[Database],
            DisasterStrategy::ServiceRecovery | DisasterStrategy::InfrastructureRecovery => {
                &[Orchestration, Services]
            }
        }
    }

    pub fn point_requirement(&self) -> Option<PointRequirement> {
        match self {
            DisasterStrategy::Rollback | DisasterStrategy::Restore => {
                Some(PointRequirement::AnyArtifact)
            }
            DisasterStrategy::DataRecovery => Some(PointRequirement::DatabaseBackup),
            _ => None,
        }
    }

    /// Whether a best-effort safety point is taken before the actions run.
    /// Rollback captures its own mandatory one.
    pub fn takes_safety_point(&self) -> bool {
        !matches!(
            self,
            DisasterStrategy::EmergencyStop | DisasterStrategy::Rollback
        )
    }

    /// Run every action in order; the first failure ends the strategy
    pub async fn execute(&self, ctx: &mut StrategyContext<'_>) -> StepResult {
        let actions = self.actions();
        for (index, action) in actions.iter().enumerate() {
            info!("[{}/{}] {}", index + 1, actions.len(), action);
            action
                .execute(ctx)
                .await
                .with_context(|| format!("{} failed", action))?;
        }
        Ok(())
    }
}

impl fmt::Display for DisasterStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.recovery_type().as_str())
    }
}

impl DisasterAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisasterAction::ActivateStandbyDatabase => "activate_standby_database",
            DisasterAction::SwitchTrafficToBackup => "switch_traffic_to_backup",
            DisasterAction::UpdateDns => "update_dns",
            DisasterAction::WaitForPropagation => "wait_for_propagation",
            DisasterAction::StopServicesGracefully => "stop_services",
            DisasterAction::StopServicesImmediately => "stop_services_immediately",
            DisasterAction::CloseDatabaseConnections => "close_database_connections",
            DisasterAction::EnterEmergencyState => "enter_emergency_state",
            DisasterAction::RestoreDatabase => "restore_database",
            DisasterAction::RestoreCode => "restore_code",
            DisasterAction::RestoreConfiguration => "restore_configuration",
            DisasterAction::StartServices => "start_services",
            DisasterAction::RestartUnhealthyServices => "restart_unhealthy_services",
            DisasterAction::RestartFailedWorkloads => "restart_failed_workloads",
            DisasterAction::AwaitRollout => "await_rollout",
        }
    }

    pub async fn execute(&self, ctx: &mut StrategyContext<'_>) -> StepResult {
        let adapters = ctx.adapters;
        match self {
            DisasterAction::ActivateStandbyDatabase => {
                let host = adapters.database.activate_standby().await?;
                info!("Standby database {} promoted", host);
                ctx.operation.record_affected("database");
            }
            DisasterAction::SwitchTrafficToBackup => {
                adapters.traffic.switch_to_backup().await?;
                ctx.operation.record_affected("load_balancer");
            }
            DisasterAction::UpdateDns => {
                adapters.traffic.update_dns("backup").await?;
                ctx.operation.record_affected("dns");
            }
            DisasterAction::WaitForPropagation => {
                info!("Waiting {:?} for propagation", ctx.propagation_wait);
                tokio::time::sleep(ctx.propagation_wait).await;
            }
            DisasterAction::StopServicesGracefully => {
                for name in adapters.containers.stop_services(StopMode::Graceful).await? {
                    ctx.operation.record_affected(name);
                }
            }
            DisasterAction::StopServicesImmediately => {
                // Every running service counts as affected, even if the kill fails part way
                for name in adapters.containers.list_services().await? {
                    ctx.operation.record_affected(name);
                }
                let stopped = adapters.containers.stop_services(StopMode::Immediate).await?;
                for name in stopped {
                    ctx.operation.record_affected(name);
                }
            }
            DisasterAction::CloseDatabaseConnections => {
                let closed = adapters.database.terminate_connections().await?;
                info!("Closed {} database connections", closed);
            }
            DisasterAction::EnterEmergencyState => {
                adapters.notifier.set_emergency_state(true).await?;
            }
            DisasterAction::RestoreDatabase => {
                let point = ctx.point()?;
                let Some(artifact) = point.database_backup_ref.as_deref() else {
                    warn!("Recovery point {} has no database backup; skipping", point.key());
                    return Ok(());
                };
                adapters
                    .snapshots
                    .restore_database(artifact, adapters.database.as_ref())
                    .await?;
                ctx.operation.record_affected("database");
            }
            DisasterAction::RestoreCode => {
                let point = ctx.point()?;
                if let Some(artifact) = point.code_snapshot_ref.as_deref() {
                    adapters.snapshots.restore_code(artifact).await?;
                    ctx.operation.record_affected("application_code");
                }
            }
            DisasterAction::RestoreConfiguration => {
                let point = ctx.point()?;
                if let Some(artifact) = point.config_snapshot_ref.as_deref() {
                    adapters.snapshots.restore_config(artifact).await?;
                    ctx.operation.record_affected("configuration");
                }
            }
            DisasterAction::StartServices => {
                for name in adapters.containers.start_services().await? {
                    ctx.operation.record_affected(name);
                }
            }
            DisasterAction::RestartUnhealthyServices => {
                for service in adapters.containers.service_health().await? {
                    if !service.healthy {
                        adapters.containers.restart_service(&service.name).await?;
                        ctx.operation.record_affected(service.name);
                    }
                }
            }
            DisasterAction::RestartFailedWorkloads => {
                let Some(orchestration) = &adapters.orchestration else {
                    info!("No orchestration platform configured; skipping");
                    return Ok(());
                };
                for workload in orchestration.failed_workloads().await? {
                    orchestration.restart_workload(&workload).await?;
                    ctx.operation.record_affected(workload);
                }
            }
            DisasterAction::AwaitRollout => {
                let Some(orchestration) = &adapters.orchestration else {
                    return Ok(());
                };
                if !orchestration.rollout_complete().await? {
                    return Err(anyhow!("deployments did not become available"));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for DisasterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_recovery_type_has_a_strategy() {
        for recovery_type in RecoveryType::ALL {
            let strategy = DisasterStrategy::for_type(recovery_type);
            assert_eq!(strategy.recovery_type(), recovery_type);
        }
    }

    #[test]
    fn test_rollback_strategy_needs_a_point_and_every_lock() {
        let strategy = DisasterStrategy::Rollback;
        assert_eq!(
            strategy.point_requirement(),
            Some(PointRequirement::AnyArtifact)
        );
        assert_eq!(strategy.resources().len(), Resource::ALL.len());
        assert!(!strategy.takes_safety_point());
    }

    #[test]
    fn test_emergency_stop_never_stops_gracefully() {
        let actions = DisasterStrategy::EmergencyStop.actions();
        assert!(!actions.contains(&DisasterAction::StopServicesGracefully));
        assert!(actions.contains(&DisasterAction::StopServicesImmediately));
        assert!(!DisasterStrategy::EmergencyStop.takes_safety_point());
    }

    #[test]
    fn test_workload_check_only_with_orchestration() {
        let without = DisasterStrategy::ServiceRecovery.verification_checks(false);
        let with = DisasterStrategy::ServiceRecovery.verification_checks(true);
        assert!(!without.contains(&VerificationCheck::WorkloadsHealthy));
        assert!(with.contains(&VerificationCheck::WorkloadsHealthy));
    }
}
