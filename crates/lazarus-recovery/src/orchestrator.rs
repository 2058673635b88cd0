//! Recovery orchestrator
//!
//! Turns an operator intent (roll back to a version, run a disaster-recovery
//! strategy) into a verified, recorded [`RecoveryOperation`]. Adapter errors
//! are caught at the step boundary and end up in the operation's error
//! message; the public entry points therefore return the operation itself
//! rather than a `Result`.

use crate::context::Adapters;
use crate::error::{RecoveryError, Result};
use crate::feasibility;
use crate::health::{self, ConnectivityCheck};
use crate::history::OperationHistory;
use crate::ids::{next_operation_id, next_point_timestamp};
use crate::lock::{LockGuard, Resource, ResourceLocks};
use crate::plan::{plan_rollback_steps, step_names, RollbackStep, StepRecovery};
use crate::store::{CleanupReport, RecoveryPointStore};
use crate::strategy::{DisasterStrategy, StrategyContext};
use crate::verification::{self, VerificationCheck};
use anyhow::{anyhow, bail, Context};
use camino::Utf8PathBuf;
use chrono::Utc;
use lazarus_adapters::{Notification, NotificationLevel, StopMode};
use lazarus_core::types::{
    RecoveryOperation, RecoveryPoint, RecoverySettings, RecoveryStatus, RecoveryType,
    ResourceThresholds, RetentionPolicy, ServicesState,
};
use lazarus_core::LazarusConfig;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Failure message that ends an operation
type Abort = String;

/// What a rollback is moving towards
struct RollbackTarget<'a> {
    version: &'a str,
    point: Option<&'a RecoveryPoint>,
    current_version: &'a str,
}

pub struct RecoveryOrchestrator {
    settings: RecoverySettings,
    thresholds: ResourceThresholds,
    retention: RetentionPolicy,
    backup_root: Utf8PathBuf,
    adapters: Adapters,
    store: RecoveryPointStore,
    history: OperationHistory,
    locks: ResourceLocks,
    /// Operations currently executing, by id (observability only)
    active: Mutex<HashMap<String, RecoveryOperation>>,
}

impl RecoveryOrchestrator {
    pub fn new(config: &LazarusConfig, adapters: Adapters, store: RecoveryPointStore) -> Self {
        let inner = config.inner();
        Self {
            settings: inner.recovery.clone(),
            thresholds: inner.resources.clone(),
            retention: inner.storage.retention.clone(),
            backup_root: config.backup_root().to_owned(),
            adapters,
            store,
            history: OperationHistory::new(config.operations_dir(), inner.recovery.history_limit),
            locks: ResourceLocks::new(config.locks_dir()),
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &RecoveryPointStore {
        &self.store
    }

    pub fn adapters(&self) -> &Adapters {
        &self.adapters
    }

    // ------------------------------------------------------------------
    // Recovery points
    // ------------------------------------------------------------------

    /// Capture and persist a recovery point for `version`.
    ///
    /// Fails when any artifact cannot be produced or when no persistence
    /// target accepts the record.
    pub async fn create_recovery_point(
        &self,
        version: &str,
        recovery_type: RecoveryType,
    ) -> Result<RecoveryPoint> {
        let metadata = BTreeMap::from([("purpose".to_string(), json!("manual"))]);
        let point = self.capture_point(version, recovery_type, metadata).await?;
        self.store.store(&point).await?;
        Ok(point)
    }

    pub async fn list_recovery_points(&self, days_back: u32) -> Result<Vec<RecoveryPoint>> {
        self.store.list_since(days_back).await
    }

    async fn capture_point(
        &self,
        version: &str,
        recovery_type: RecoveryType,
        metadata: BTreeMap<String, serde_json::Value>,
    ) -> Result<RecoveryPoint> {
        let timestamp = next_point_timestamp();
        let name = format!("{}_{}", recovery_type, version);
        info!("Capturing recovery point for {} ({})", version, recovery_type);

        let (database, code, config) = self.capture_artifacts(&name).await?;

        let containers = self
            .adapters
            .containers
            .list_services()
            .await
            .inspect_err(|e| warn!("Could not list services for recovery point: {:#}", e))
            .unwrap_or_default();
        let database_connections = self
            .adapters
            .database
            .active_connections()
            .await
            .inspect_err(|e| warn!("Could not count database connections: {:#}", e))
            .ok();
        let health_metrics = self.adapters.collect_health().await;

        Ok(RecoveryPoint {
            timestamp,
            deployment_version: version.to_string(),
            database_backup_ref: Some(database),
            code_snapshot_ref: Some(code),
            config_snapshot_ref: Some(config),
            services_state: ServicesState {
                containers,
                process_count: health_metrics.process_count,
                database_connections,
            },
            health_metrics,
            recovery_type,
            metadata,
        })
    }

    /// Produce all three artifacts; on failure the ones already written are removed
    async fn capture_artifacts(&self, name: &str) -> Result<(String, String, String)> {
        let snapshots = &self.adapters.snapshots;
        let mut created: Vec<String> = Vec::new();

        let outcome = async {
            let database = snapshots
                .create_database_backup(name)
                .await
                .context("database backup failed")?;
            created.push(database.clone());
            let code = snapshots
                .create_code_snapshot(name)
                .await
                .context("code snapshot failed")?;
            created.push(code.clone());
            let config = snapshots
                .create_config_snapshot(name)
                .await
                .context("configuration snapshot failed")?;
            Ok::<_, anyhow::Error>((database, code, config))
        }
        .await;

        match outcome {
            Ok(artifacts) => Ok(artifacts),
            Err(e) => {
                for artifact in created {
                    discard_artifact(&artifact).await;
                }
                Err(RecoveryError::Capture(format!("{:#}", e)))
            }
        }
    }

    /// Capture a point and try to persist it; persistence failures are logged only
    async fn capture_and_store(
        &self,
        version: &str,
        recovery_type: RecoveryType,
        metadata: BTreeMap<String, serde_json::Value>,
    ) -> Result<RecoveryPoint> {
        let point = self.capture_point(version, recovery_type, metadata).await?;
        if let Err(e) = self.store.store(&point).await {
            warn!("Recovery point {} was not persisted: {}", point.key(), e);
        }
        Ok(point)
    }

    // ------------------------------------------------------------------
    // Rollback
    // ------------------------------------------------------------------

    /// Roll the application back to `target_version`.
    ///
    /// Without `force` the feasibility checks gate execution. The pre-rollback
    /// safety point is taken regardless.
    pub async fn execute_rollback(
        &self,
        target_version: &str,
        recovery_point: Option<&str>,
        force: bool,
    ) -> RecoveryOperation {
        let mut operation = RecoveryOperation::new(
            next_operation_id(RecoveryType::Rollback),
            RecoveryType::Rollback,
        );
        operation.set_target_version(target_version);
        if let Some(key) = recovery_point {
            operation.set_target_recovery_point(key);
        }
        info!(
            "Starting rollback {} to {}",
            operation.operation_id(),
            target_version
        );

        let outcome = match self.admit(&operation) {
            Ok(()) => {
                self.run_rollback(&mut operation, target_version, recovery_point, force)
                    .await
            }
            Err(message) => Err(message),
        };
        if let Err(message) = outcome {
            abort(&mut operation, message);
        }
        self.finalize(operation)
    }

    async fn run_rollback(
        &self,
        op: &mut RecoveryOperation,
        target_version: &str,
        point_key: Option<&str>,
        force: bool,
    ) -> std::result::Result<(), Abort> {
        op.begin().map_err(|e| e.to_string())?;
        self.publish(op);

        let point = self.resolve_rollback_point(target_version, point_key).await?;
        if let Some(point) = &point {
            op.set_target_recovery_point(point.key());
        }

        self.roll_back_to(op, target_version, point, force).await
    }

    /// The rollback protocol proper: validate, capture the safety point, run
    /// the fixed plan and verify
    async fn roll_back_to(
        &self,
        op: &mut RecoveryOperation,
        target_version: &str,
        point: Option<RecoveryPoint>,
        force: bool,
    ) -> std::result::Result<(), Abort> {
        if force {
            warn!("Feasibility validation skipped for {} (forced)", op.operation_id());
        } else {
            let report = feasibility::validate_rollback(
                &self.adapters,
                &self.settings,
                &self.thresholds,
                target_version,
                point.as_ref(),
            )
            .await;
            for check in &report.checks {
                match &check.reason {
                    Some(reason) => warn!("Feasibility {} failed: {}", check.name, reason),
                    None => debug!("Feasibility {} passed", check.name),
                }
            }
            if !report.passed() {
                return Err(report.failure_summary());
            }
        }

        let _guard = self.lock(&Resource::ALL, op)?;

        let current_version = self.current_version().await;
        let safety = self
            .capture_and_store(
                &current_version,
                RecoveryType::Rollback,
                point_metadata("pre_rollback", op.operation_id()),
            )
            .await
            .map_err(|e| format!("Failed to create pre-rollback safety point: {}", e))?;
        info!("Safety point {} captured for {}", safety.key(), current_version);

        let plan = plan_rollback_steps(target_version, point.as_ref());
        op.set_plan(step_names(&plan)).map_err(|e| e.to_string())?;
        self.publish(op);

        let target = RollbackTarget {
            version: target_version,
            point: point.as_ref(),
            current_version: &current_version,
        };

        for (index, step) in plan.iter().enumerate() {
            info!("[{}/{}] {}", index + 1, plan.len(), step);
            if let Err(e) = self.run_step(*step, op, &target).await {
                warn!("Step {} failed: {:#}", step, e);
                if let Err(recovery_error) = self.recover_step(*step, op, &target).await {
                    error!("Recovery of step {} failed: {:#}", step, recovery_error);
                    self.emergency_restore(&safety).await;
                    return Err(format!("Step {} failed: {:#}", step, e));
                }
                info!("Step {} recovered", step);
            }
            self.publish(op);
        }

        self.verify(op, &VerificationCheck::ROLLBACK).await
    }

    async fn resolve_rollback_point(
        &self,
        target_version: &str,
        point_key: Option<&str>,
    ) -> std::result::Result<Option<RecoveryPoint>, Abort> {
        match point_key {
            Some(key) => self.load_point(key).await.map(Some),
            None => match self.store.latest_for_version(target_version).await {
                Ok(point) => Ok(point),
                Err(e) => {
                    warn!("Could not look up recovery points for {}: {}", target_version, e);
                    Ok(None)
                }
            },
        }
    }

    async fn run_step(
        &self,
        step: RollbackStep,
        op: &mut RecoveryOperation,
        target: &RollbackTarget<'_>,
    ) -> anyhow::Result<()> {
        let adapters = &self.adapters;
        match step {
            RollbackStep::StopServices => {
                for name in adapters.containers.stop_services(StopMode::Graceful).await? {
                    op.record_affected(name);
                }
            }
            RollbackStep::BackupCurrentState => {
                let point = self
                    .capture_and_store(
                        target.current_version,
                        RecoveryType::Rollback,
                        point_metadata("pre_rollback_quiesced", op.operation_id()),
                    )
                    .await?;
                info!("Quiesced state captured as {}", point.key());
            }
            RollbackStep::RollbackDatabase => {
                let Some(artifact) = target.point.and_then(|p| p.database_backup_ref.as_deref())
                else {
                    info!("No database backup for {}; database left as is", target.version);
                    return Ok(());
                };
                let closed = adapters.database.terminate_connections().await?;
                debug!("Terminated {} database connections", closed);
                adapters
                    .snapshots
                    .restore_database(artifact, adapters.database.as_ref())
                    .await?;
                op.record_affected("database");
            }
            RollbackStep::RollbackApplicationCode => {
                match target.point.and_then(|p| p.code_snapshot_ref.as_deref()) {
                    Some(artifact) => adapters.snapshots.restore_code(artifact).await?,
                    None => adapters.application.checkout(target.version).await?,
                }
                op.record_affected("application_code");
            }
            RollbackStep::RollbackConfiguration => {
                let Some(artifact) = target.point.and_then(|p| p.config_snapshot_ref.as_deref())
                else {
                    info!("No configuration snapshot for {}; configuration left as is", target.version);
                    return Ok(());
                };
                adapters.snapshots.restore_config(artifact).await?;
                op.record_affected("configuration");
            }
            RollbackStep::UpdateContainerImages => {
                let images = adapters.containers.update_images(target.version).await?;
                debug!("Updated images: {}", images.join(", "));
            }
            RollbackStep::RestartServices => {
                for name in adapters.containers.start_services().await? {
                    op.record_affected(name);
                }
            }
            RollbackStep::VerifyServiceHealth => self.require_healthy_services().await?,
            RollbackStep::UpdateLoadBalancer => {
                adapters.traffic.route_to_version(target.version).await?;
                op.record_affected("load_balancer");
                let wait = Duration::from_secs(self.settings.propagation_wait_secs);
                info!("Waiting {:?} for routing changes to propagate", wait);
                tokio::time::sleep(wait).await;
            }
            RollbackStep::RunIntegrationTests => adapters.application.run_integration_tests().await?,
            RollbackStep::UpdateMonitoring => {
                adapters.notifier.record_deployment(target.version).await?;
                op.record_affected("monitoring");
            }
        }
        Ok(())
    }

    async fn recover_step(
        &self,
        step: RollbackStep,
        op: &mut RecoveryOperation,
        target: &RollbackTarget<'_>,
    ) -> anyhow::Result<()> {
        match step.recovery() {
            StepRecovery::RetryOnce => {
                info!("Retrying step {}", step);
                self.run_step(step, op, target).await
            }
            StepRecovery::StopImmediately => {
                warn!("Graceful stop failed; stopping services immediately");
                for name in self.adapters.containers.stop_services(StopMode::Immediate).await? {
                    op.record_affected(name);
                }
                Ok(())
            }
            StepRecovery::RestartUnhealthy => {
                for service in self.adapters.containers.service_health().await? {
                    if !service.healthy {
                        info!("Restarting unhealthy service {}", service.name);
                        self.adapters.containers.restart_service(&service.name).await?;
                    }
                }
                self.require_healthy_services().await
            }
            StepRecovery::None => Err(anyhow!("no step-local recovery for {}", step)),
        }
    }

    async fn require_healthy_services(&self) -> anyhow::Result<()> {
        let services = self.adapters.containers.service_health().await?;
        if services.is_empty() {
            bail!("no services reported health");
        }
        let unhealthy: Vec<&str> = services
            .iter()
            .filter(|s| !s.healthy)
            .map(|s| s.name.as_str())
            .collect();
        if !unhealthy.is_empty() {
            bail!("unhealthy services: {}", unhealthy.join(", "));
        }
        Ok(())
    }

    /// Put back the pre-operation state wholesale. Every failure is logged and
    /// the remaining restores still run.
    async fn emergency_restore(&self, safety: &RecoveryPoint) {
        error!("Emergency restore from safety point {}", safety.key());
        let adapters = &self.adapters;

        let alert = Notification::new(
            NotificationLevel::Critical,
            "Emergency restore",
            format!(
                "Restoring pre-operation state ({}) from recovery point {}",
                safety.deployment_version,
                safety.key()
            ),
        );
        if let Err(e) = adapters.notifier.notify(&alert).await {
            warn!("Emergency notification failed: {:#}", e);
        }

        if let Err(e) = adapters.containers.stop_services(StopMode::Immediate).await {
            error!("Emergency restore: stopping services failed: {:#}", e);
        }
        if let Some(artifact) = safety.database_backup_ref.as_deref() {
            if let Err(e) = adapters
                .snapshots
                .restore_database(artifact, adapters.database.as_ref())
                .await
            {
                error!("Emergency restore: database restore failed: {:#}", e);
            }
        }
        if let Some(artifact) = safety.code_snapshot_ref.as_deref() {
            if let Err(e) = adapters.snapshots.restore_code(artifact).await {
                error!("Emergency restore: code restore failed: {:#}", e);
            }
        }
        if let Some(artifact) = safety.config_snapshot_ref.as_deref() {
            if let Err(e) = adapters.snapshots.restore_config(artifact).await {
                error!("Emergency restore: configuration restore failed: {:#}", e);
            }
        }
        if let Err(e) = adapters.containers.start_services().await {
            error!("Emergency restore: starting services failed: {:#}", e);
        }
        error!("Emergency restore from {} finished", safety.key());
    }

    // ------------------------------------------------------------------
    // Disaster recovery
    // ------------------------------------------------------------------

    /// Run the disaster-recovery strategy for `recovery_type`
    pub async fn execute_disaster_recovery(
        &self,
        recovery_type: RecoveryType,
        recovery_point: Option<&str>,
        emergency_mode: bool,
    ) -> RecoveryOperation {
        let mut operation = RecoveryOperation::new(next_operation_id(recovery_type), recovery_type);
        if let Some(key) = recovery_point {
            operation.set_target_recovery_point(key);
        }
        info!(
            "Starting disaster recovery {} ({}{})",
            operation.operation_id(),
            recovery_type,
            if emergency_mode { ", emergency mode" } else { "" }
        );

        let outcome = match self.admit(&operation) {
            Ok(()) => {
                self.run_disaster_recovery(&mut operation, recovery_point, emergency_mode)
                    .await
            }
            Err(message) => Err(message),
        };
        if let Err(message) = outcome {
            abort(&mut operation, message);
        }
        self.finalize(operation)
    }

    async fn run_disaster_recovery(
        &self,
        op: &mut RecoveryOperation,
        point_key: Option<&str>,
        emergency_mode: bool,
    ) -> std::result::Result<(), Abort> {
        op.begin().map_err(|e| e.to_string())?;
        self.publish(op);

        let strategy = DisasterStrategy::for_type(op.recovery_type());

        if emergency_mode {
            let alert = Notification::new(
                NotificationLevel::Critical,
                format!("EMERGENCY {}", strategy),
                format!("Operation {} started in emergency mode", op.operation_id()),
            );
            if let Err(e) = self.adapters.notifier.notify(&alert).await {
                warn!("Emergency notification failed: {:#}", e);
            }
        }

        let point = self.resolve_disaster_point(strategy, point_key).await?;
        if let Some(point) = &point {
            op.set_target_recovery_point(point.key());
        }

        if strategy == DisasterStrategy::Rollback {
            let Some(point) = point else {
                return Err("No recovery point to roll back to".to_string());
            };
            let version = point.deployment_version.clone();
            info!("Rolling back to {} from recovery point {}", version, point.key());
            op.set_target_version(version.as_str());
            return self.roll_back_to(op, &version, Some(point), false).await;
        }

        let _guard = self.lock(strategy.resources(), op)?;

        if strategy.takes_safety_point() {
            let current_version = self.current_version().await;
            match self
                .capture_and_store(
                    &current_version,
                    strategy.recovery_type(),
                    point_metadata("pre_disaster_recovery", op.operation_id()),
                )
                .await
            {
                Ok(safety) => info!("Safety point {} captured", safety.key()),
                Err(e) => warn!("Proceeding without a safety point: {}", e),
            }
        }

        let plan = strategy
            .actions()
            .iter()
            .map(|a| a.as_str().to_string())
            .collect();
        op.set_plan(plan).map_err(|e| e.to_string())?;
        self.publish(op);

        let mut ctx = StrategyContext {
            adapters: &self.adapters,
            operation: &mut *op,
            point: point.as_ref(),
            propagation_wait: Duration::from_secs(self.settings.propagation_wait_secs),
        };
        strategy
            .execute(&mut ctx)
            .await
            .map_err(|e| format!("{:#}", e))?;
        self.publish(op);

        let checks = strategy.verification_checks(self.adapters.orchestration.is_some());
        self.verify(op, &checks).await
    }

    async fn resolve_disaster_point(
        &self,
        strategy: DisasterStrategy,
        point_key: Option<&str>,
    ) -> std::result::Result<Option<RecoveryPoint>, Abort> {
        let requirement = strategy.point_requirement();
        let point = match (point_key, requirement) {
            (Some(key), _) => Some(self.load_point(key).await?),
            (None, Some(requirement)) => self
                .store
                .latest_matching(|p| requirement.is_met_by(p))
                .await
                .map_err(|e| format!("Failed to list recovery points: {}", e))?,
            (None, None) => None,
        };

        if let Some(requirement) = requirement {
            match &point {
                Some(p) if requirement.is_met_by(p) => {}
                Some(p) => {
                    return Err(format!(
                        "Recovery point {} is unsuitable: {} requires {}",
                        p.key(),
                        strategy,
                        requirement
                    ))
                }
                None => {
                    return Err(format!(
                        "No suitable recovery point found: {} requires {}",
                        strategy, requirement
                    ))
                }
            }
        }
        Ok(point)
    }

    // ------------------------------------------------------------------
    // Shared envelope
    // ------------------------------------------------------------------

    async fn load_point(&self, key: &str) -> std::result::Result<RecoveryPoint, Abort> {
        match self.store.get(key).await {
            Ok(Some(point)) => Ok(point),
            Ok(None) => Err(RecoveryError::PointNotFound(key.to_string()).to_string()),
            Err(e) => Err(format!("Failed to load recovery point {}: {}", key, e)),
        }
    }

    async fn current_version(&self) -> String {
        match self.adapters.application.current_version().await {
            Ok(Some(version)) => version,
            Ok(None) => "unknown".to_string(),
            Err(e) => {
                warn!("Could not determine current version: {:#}", e);
                "unknown".to_string()
            }
        }
    }

    fn lock(
        &self,
        resources: &[Resource],
        op: &RecoveryOperation,
    ) -> std::result::Result<LockGuard, Abort> {
        self.locks
            .try_acquire(resources, op.operation_id())
            .map_err(|e| format!("Cannot start {}: {}", op.recovery_type(), e))
    }

    async fn verify(
        &self,
        op: &mut RecoveryOperation,
        checks: &[VerificationCheck],
    ) -> std::result::Result<(), Abort> {
        op.start_verification().map_err(|e| e.to_string())?;
        self.publish(op);

        let deadline = Instant::now() + Duration::from_secs(self.settings.verification_timeout_secs);
        for (check, passed) in verification::run_checks(checks, &self.adapters, deadline).await {
            if !passed {
                warn!("Verification {} failed for {}", check, op.operation_id());
            }
            op.record_verification(check.as_str(), passed)
                .map_err(|e| e.to_string())?;
        }
        op.finish_verification().map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Register a new operation, refusing it at the parallel ceiling
    fn admit(&self, op: &RecoveryOperation) -> std::result::Result<(), Abort> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.len() >= self.settings.parallel_recovery_jobs {
            return Err(format!(
                "Parallel recovery limit reached: {} operations already running",
                active.len()
            ));
        }
        active.insert(op.operation_id().to_string(), op.clone());
        Ok(())
    }

    fn publish(&self, op: &RecoveryOperation) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = active.get_mut(op.operation_id()) {
            *entry = op.clone();
        }
    }

    fn finalize(&self, op: RecoveryOperation) -> RecoveryOperation {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(op.operation_id());

        match op.status() {
            RecoveryStatus::Completed => info!(
                "Operation {} completed in {}s",
                op.operation_id(),
                op.duration().num_seconds()
            ),
            status => warn!(
                "Operation {} finished {}: {}",
                op.operation_id(),
                status,
                op.error_message().unwrap_or("")
            ),
        }

        if let Err(e) = self.history.record(&op) {
            warn!("Operation {} not recorded in history: {}", op.operation_id(), e);
        }
        op
    }

    // ------------------------------------------------------------------
    // Queries and maintenance
    // ------------------------------------------------------------------

    /// Snapshots of the operations executing right now
    pub fn active_operations(&self) -> Vec<RecoveryOperation> {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        let mut operations: Vec<RecoveryOperation> = active.values().cloned().collect();
        operations.sort_by_key(|op| op.start_time());
        operations
    }

    /// Operations finished by this process, newest first
    pub fn recent_operations(&self) -> Vec<RecoveryOperation> {
        self.history.recent()
    }

    /// Persisted operation records, newest first
    pub fn operation_history(&self, limit: usize) -> Result<Vec<RecoveryOperation>> {
        self.history.load(limit)
    }

    /// Apply the retention policy to recovery points, artifacts and history
    pub async fn cleanup(&self, dry_run: bool) -> Result<CleanupReport> {
        let mut report = self.store.cleanup(self.retention.days, dry_run).await?;
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(self.retention.days));
        report.operations_removed = self.history.cleanup(cutoff, dry_run)?;
        Ok(report)
    }

    pub async fn check_connectivity(&self) -> Vec<ConnectivityCheck> {
        health::check_connectivity(&self.adapters, &self.store, &self.backup_root).await
    }
}

fn abort(op: &mut RecoveryOperation, message: Abort) {
    error!("Operation {} failed: {}", op.operation_id(), message);
    if let Err(e) = op.fail(message) {
        warn!("{}", e);
    }
}

fn point_metadata(purpose: &str, operation_id: &str) -> BTreeMap<String, serde_json::Value> {
    BTreeMap::from([
        ("purpose".to_string(), json!(purpose)),
        ("operation_id".to_string(), json!(operation_id)),
    ])
}

async fn discard_artifact(reference: &str) {
    let path = Utf8PathBuf::from(reference);
    match tokio::task::spawn_blocking(move || lazarus_backup::remove_artifact(&path)).await {
        Ok(Ok(removed)) => debug!("Discarded partial artifact {} ({})", reference, removed),
        Ok(Err(e)) => warn!("Could not discard partial artifact {}: {}", reference, e),
        Err(e) => warn!("Artifact cleanup task failed for {}: {}", reference, e),
    }
}
