//! The fixed rollback step sequence

use lazarus_core::types::RecoveryPoint;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// One step of a rollback, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackStep {
    StopServices,
    BackupCurrentState,
    RollbackDatabase,
    RollbackApplicationCode,
    RollbackConfiguration,
    UpdateContainerImages,
    RestartServices,
    VerifyServiceHealth,
    UpdateLoadBalancer,
    RunIntegrationTests,
    UpdateMonitoring,
}

/// What to try when a step fails, before falling back to an emergency restore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepRecovery {
    /// Run the same step once more
    RetryOnce,
    /// Kill the services that would not stop gracefully
    StopImmediately,
    /// Restart the unhealthy services and check again
    RestartUnhealthy,
    /// No local remedy
    None,
}

impl RollbackStep {
    pub const SEQUENCE: [RollbackStep; 11] = [
        RollbackStep::StopServices,
        RollbackStep::BackupCurrentState,
        RollbackStep::RollbackDatabase,
        RollbackStep::RollbackApplicationCode,
        RollbackStep::RollbackConfiguration,
        RollbackStep::UpdateContainerImages,
        RollbackStep::RestartServices,
        RollbackStep::VerifyServiceHealth,
        RollbackStep::UpdateLoadBalancer,
        RollbackStep::RunIntegrationTests,
        RollbackStep::UpdateMonitoring,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RollbackStep::StopServices => "stop_services",
            RollbackStep::BackupCurrentState => "backup_current_state",
            RollbackStep::RollbackDatabase => "rollback_database",
            RollbackStep::RollbackApplicationCode => "rollback_application_code",
            RollbackStep::RollbackConfiguration => "rollback_configuration",
            RollbackStep::UpdateContainerImages => "update_container_images",
            RollbackStep::RestartServices => "restart_services",
            RollbackStep::VerifyServiceHealth => "verify_service_health",
            RollbackStep::UpdateLoadBalancer => "update_load_balancer",
            RollbackStep::RunIntegrationTests => "run_integration_tests",
            RollbackStep::UpdateMonitoring => "update_monitoring",
        }
    }

    pub fn recovery(&self) -> StepRecovery {
        match self {
            RollbackStep::StopServices => StepRecovery::StopImmediately,
            RollbackStep::VerifyServiceHealth => StepRecovery::RestartUnhealthy,
            // A second capture or a second test run would not change the verdict
            RollbackStep::BackupCurrentState | RollbackStep::RunIntegrationTests => {
                StepRecovery::None
            }
            _ => StepRecovery::RetryOnce,
        }
    }
}

impl fmt::Display for RollbackStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Steps for rolling back to `target_version`.
///
/// The sequence is always the full fixed list; steps that have nothing to do
/// for a given point (no database backup, no config snapshot) are skipped at
/// execution time, so the plan itself never varies.
pub fn plan_rollback_steps(target_version: &str, point: Option<&RecoveryPoint>) -> Vec<RollbackStep> {
    debug!(
        "Planning rollback to {} from point {}",
        target_version,
        point.map(RecoveryPoint::key).unwrap_or_else(|| "none".to_string())
    );
    RollbackStep::SEQUENCE.to_vec()
}

/// Step names as recorded on the operation
pub fn step_names(steps: &[RollbackStep]) -> Vec<String> {
    steps.iter().map(|s| s.as_str().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_order() {
        let plan = plan_rollback_steps("v1.0.0", None);
        assert_eq!(plan.len(), 11);
        assert_eq!(plan.first(), Some(&RollbackStep::StopServices));
        assert_eq!(plan.last(), Some(&RollbackStep::UpdateMonitoring));
        let db = plan.iter().position(|s| *s == RollbackStep::RollbackDatabase);
        let restart = plan.iter().position(|s| *s == RollbackStep::RestartServices);
        assert!(db < restart);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let first = step_names(&plan_rollback_steps("v2.3.1", None));
        for _ in 0..10 {
            assert_eq!(step_names(&plan_rollback_steps("v2.3.1", None)), first);
        }
    }

    #[test]
    fn test_step_serde_matches_display() {
        for step in RollbackStep::SEQUENCE {
            let json = serde_json::to_string(&step).unwrap();
            assert_eq!(json, format!("\"{}\"", step));
        }
    }

    #[test]
    fn test_recovery_actions() {
        assert_eq!(
            RollbackStep::StopServices.recovery(),
            StepRecovery::StopImmediately
        );
        assert_eq!(
            RollbackStep::RollbackDatabase.recovery(),
            StepRecovery::RetryOnce
        );
        assert_eq!(RollbackStep::RunIntegrationTests.recovery(), StepRecovery::None);
    }
}
