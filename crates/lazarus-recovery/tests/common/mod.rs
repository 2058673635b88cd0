//! Common test utilities for lazarus-recovery
//!
//! Recording doubles for every orchestrator collaborator. All doubles share
//! one [`CallLog`], so tests can assert on the global call order and inject
//! failures by call name.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use lazarus_adapters::{
    ApplicationAdapter, ContainerAdapter, DatabaseAdapter, Notification, NotificationAdapter,
    ServiceHealth, StopMode, TrafficAdapter,
};
use lazarus_core::types::HealthMetrics;
use lazarus_core::LazarusConfig;
use lazarus_health::HealthSource;
use lazarus_recovery::{Adapters, RecoveryOrchestrator, RecoveryPointStore, Snapshotter};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::Notify;

/// Shared, ordered record of adapter calls with failure injection
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl CallLog {
    /// Record `call`; errors when the call was marked as failing
    pub fn record(&self, call: impl Into<String>) -> Result<()> {
        let call = call.into();
        self.calls.lock().unwrap().push(call.clone());
        if self.failing.lock().unwrap().contains(&call) {
            return Err(anyhow!("{} failed (injected)", call));
        }
        Ok(())
    }

    pub fn fail(&self, call: &str) {
        self.failing.lock().unwrap().insert(call.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    pub fn contains(&self, call: &str) -> bool {
        self.count(call) > 0
    }

    /// Index of the first occurrence of `call`
    pub fn position(&self, call: &str) -> Option<usize> {
        self.calls.lock().unwrap().iter().position(|c| c == call)
    }
}

pub struct MockDatabase {
    log: CallLog,
    connections: Mutex<u32>,
}

impl MockDatabase {
    pub fn set_connections(&self, count: u32) {
        *self.connections.lock().unwrap() = count;
    }
}

#[async_trait]
impl DatabaseAdapter for MockDatabase {
    async fn ping(&self) -> Result<()> {
        self.log.record("database.ping")
    }

    async fn active_connections(&self) -> Result<u32> {
        self.log.record("database.active_connections")?;
        Ok(*self.connections.lock().unwrap())
    }

    async fn restore(&self, _dump: &Utf8Path) -> Result<()> {
        self.log.record("database.restore")
    }

    async fn terminate_connections(&self) -> Result<u32> {
        self.log.record("database.terminate_connections")?;
        let mut connections = self.connections.lock().unwrap();
        let closed = *connections;
        *connections = 0;
        Ok(closed)
    }

    async fn activate_standby(&self) -> Result<String> {
        self.log.record("database.activate_standby")?;
        Ok("standby.internal".to_string())
    }
}

pub struct MockContainers {
    log: CallLog,
    services: Vec<String>,
    running: Mutex<bool>,
    unhealthy: Mutex<Vec<String>>,
}

impl MockContainers {
    pub fn set_unhealthy(&self, names: &[&str]) {
        *self.unhealthy.lock().unwrap() = names.iter().map(|s| s.to_string()).collect();
    }

    pub fn is_running(&self) -> bool {
        *self.running.lock().unwrap()
    }
}

#[async_trait]
impl ContainerAdapter for MockContainers {
    async fn ping(&self) -> Result<()> {
        self.log.record("containers.ping")
    }

    async fn list_services(&self) -> Result<Vec<String>> {
        self.log.record("containers.list_services")?;
        Ok(if self.is_running() {
            self.services.clone()
        } else {
            Vec::new()
        })
    }

    async fn stop_services(&self, mode: StopMode) -> Result<Vec<String>> {
        self.log.record(format!("containers.stop_services({})", mode))?;
        *self.running.lock().unwrap() = false;
        Ok(self.services.clone())
    }

    async fn start_services(&self) -> Result<Vec<String>> {
        self.log.record("containers.start_services")?;
        *self.running.lock().unwrap() = true;
        Ok(self.services.clone())
    }

    async fn restart_service(&self, name: &str) -> Result<()> {
        self.log.record(format!("containers.restart_service({})", name))?;
        self.unhealthy.lock().unwrap().retain(|n| n != name);
        Ok(())
    }

    async fn update_images(&self, version: &str) -> Result<Vec<String>> {
        self.log.record("containers.update_images")?;
        Ok(vec![format!("registry.local/app:{}", version)])
    }

    async fn service_health(&self) -> Result<Vec<ServiceHealth>> {
        self.log.record("containers.service_health")?;
        let running = self.is_running();
        let unhealthy = self.unhealthy.lock().unwrap();
        Ok(self
            .services
            .iter()
            .map(|name| {
                let healthy = running && !unhealthy.contains(name);
                ServiceHealth {
                    name: name.clone(),
                    healthy,
                    status: if healthy { "running" } else { "exited" }.to_string(),
                }
            })
            .collect())
    }
}

pub struct MockTraffic {
    log: CallLog,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl MockTraffic {
    /// Make the next `route_to_version` wait until the returned handle is notified
    pub fn hold(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&notify));
        notify
    }
}

#[async_trait]
impl TrafficAdapter for MockTraffic {
    async fn route_to_version(&self, _version: &str) -> Result<()> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.log.record("traffic.route_to_version")
    }

    async fn switch_to_backup(&self) -> Result<()> {
        self.log.record("traffic.switch_to_backup")
    }

    async fn update_dns(&self, _target: &str) -> Result<()> {
        self.log.record("traffic.update_dns")
    }
}

pub struct MockApplication {
    log: CallLog,
    versions: Vec<String>,
    current: Option<String>,
}

#[async_trait]
impl ApplicationAdapter for MockApplication {
    async fn list_versions(&self) -> Result<Vec<String>> {
        self.log.record("application.list_versions")?;
        Ok(self.versions.clone())
    }

    async fn current_version(&self) -> Result<Option<String>> {
        self.log.record("application.current_version")?;
        Ok(self.current.clone())
    }

    async fn checkout(&self, _version: &str) -> Result<()> {
        self.log.record("application.checkout")
    }

    async fn health_check(&self) -> Result<bool> {
        self.log.record("application.health_check")?;
        Ok(true)
    }

    async fn run_integration_tests(&self) -> Result<()> {
        self.log.record("application.run_integration_tests")
    }
}

pub struct MockNotifier {
    log: CallLog,
    notifications: Mutex<Vec<Notification>>,
}

impl MockNotifier {
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn titled(&self, title: &str) -> usize {
        self.notifications().iter().filter(|n| n.title == title).count()
    }
}

#[async_trait]
impl NotificationAdapter for MockNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        self.notifications.lock().unwrap().push(notification.clone());
        self.log.record("notifier.notify")
    }

    async fn set_emergency_state(&self, active: bool) -> Result<()> {
        self.log.record(format!("notifier.set_emergency_state({})", active))
    }

    async fn record_deployment(&self, _version: &str) -> Result<()> {
        self.log.record("notifier.record_deployment")
    }
}

pub struct MockSnapshots {
    log: CallLog,
    counter: AtomicUsize,
}

impl MockSnapshots {
    fn next_ref(&self, category: &str, name: &str, ext: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("/mock/{}/{}_{:04}.{}", category, name, n, ext)
    }
}

#[async_trait]
impl Snapshotter for MockSnapshots {
    async fn create_database_backup(&self, name: &str) -> Result<String> {
        self.log.record("snapshots.create_database_backup")?;
        Ok(self.next_ref("database", name, "dump.enc"))
    }

    async fn create_code_snapshot(&self, name: &str) -> Result<String> {
        self.log.record("snapshots.create_code_snapshot")?;
        Ok(self.next_ref("code_snapshots", name, "tar.gz.enc"))
    }

    async fn create_config_snapshot(&self, name: &str) -> Result<String> {
        self.log.record("snapshots.create_config_snapshot")?;
        Ok(self.next_ref("config_snapshots", name, "tar.gz.enc"))
    }

    async fn restore_database(&self, artifact: &str, database: &dyn DatabaseAdapter) -> Result<()> {
        self.log.record("snapshots.restore_database")?;
        database.restore(Utf8Path::new(artifact)).await
    }

    async fn restore_code(&self, _artifact: &str) -> Result<()> {
        self.log.record("snapshots.restore_code")
    }

    async fn restore_config(&self, _artifact: &str) -> Result<()> {
        self.log.record("snapshots.restore_config")
    }
}

/// Health source reporting comfortable headroom
pub struct FixedHealth(pub HealthMetrics);

impl HealthSource for FixedHealth {
    fn collect_health_metrics(&self) -> HealthMetrics {
        self.0.clone()
    }
}

pub fn quiet_host() -> HealthMetrics {
    HealthMetrics {
        cpu_usage: 12.0,
        memory_usage: 35.0,
        disk_usage: 40.0,
        process_count: 180,
        load_average_1min: 0.4,
        ..Default::default()
    }
}

/// A complete set of doubles over a scratch backup root
pub struct Harness {
    pub temp: TempDir,
    pub config: LazarusConfig,
    pub log: CallLog,
    pub database: Arc<MockDatabase>,
    pub containers: Arc<MockContainers>,
    pub traffic: Arc<MockTraffic>,
    pub application: Arc<MockApplication>,
    pub notifier: Arc<MockNotifier>,
    pub snapshots: Arc<MockSnapshots>,
}

pub const SERVICES: [&str; 3] = ["api", "worker", "scheduler"];

impl Harness {
    /// Releases v1.0.0..v1.3.0 with v1.3.0 live
    pub fn new() -> Self {
        Self::with_versions(&["v1.0.0", "v1.1.0", "v1.2.0", "v1.3.0"], Some("v1.3.0"))
    }

    pub fn with_versions(versions: &[&str], current: Option<&str>) -> Self {
        let temp = TempDir::new().unwrap();
        let mut config = LazarusConfig::default();
        config.config.storage.backup_root =
            Utf8PathBuf::from_path_buf(temp.path().join("backups")).unwrap();
        config.config.recovery.propagation_wait_secs = 0;
        config.config.recovery.verification_timeout_secs = 5;

        let log = CallLog::default();
        Self {
            temp,
            config,
            database: Arc::new(MockDatabase {
                log: log.clone(),
                connections: Mutex::new(3),
            }),
            containers: Arc::new(MockContainers {
                log: log.clone(),
                services: SERVICES.iter().map(|s| s.to_string()).collect(),
                running: Mutex::new(true),
                unhealthy: Mutex::new(Vec::new()),
            }),
            traffic: Arc::new(MockTraffic {
                log: log.clone(),
                gate: Mutex::new(None),
            }),
            application: Arc::new(MockApplication {
                log: log.clone(),
                versions: versions.iter().map(|s| s.to_string()).collect(),
                current: current.map(str::to_string),
            }),
            notifier: Arc::new(MockNotifier {
                log: log.clone(),
                notifications: Mutex::new(Vec::new()),
            }),
            snapshots: Arc::new(MockSnapshots {
                log: log.clone(),
                counter: AtomicUsize::new(0),
            }),
            log,
        }
    }

    pub fn adapters(&self) -> Adapters {
        Adapters {
            database: self.database.clone(),
            containers: self.containers.clone(),
            orchestration: None,
            traffic: self.traffic.clone(),
            application: self.application.clone(),
            notifier: self.notifier.clone(),
            snapshots: self.snapshots.clone(),
            health: Arc::new(FixedHealth(quiet_host())),
        }
    }

    pub fn store(&self) -> RecoveryPointStore {
        RecoveryPointStore::new(
            self.config.recovery_points_dir(),
            None,
            self.config.inner().storage.retention.clone(),
        )
    }

    pub fn orchestrator(&self) -> RecoveryOrchestrator {
        RecoveryOrchestrator::new(&self.config, self.adapters(), self.store())
    }
}
