//! Adapter trait definitions
//!
//! The orchestrator only touches live infrastructure through these traits. Each
//! production implementation wraps an external CLI or HTTP endpoint; tests
//! substitute recording doubles.

use anyhow::Result;
use async_trait::async_trait;
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How running services are brought down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopMode {
    /// Signal and wait for a clean shutdown
    Graceful,
    /// Kill without waiting
    Immediate,
}

impl fmt::Display for StopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopMode::Graceful => write!(f, "graceful"),
            StopMode::Immediate => write!(f, "immediate"),
        }
    }
}

/// Observed health of one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub name: String,
    pub healthy: bool,
    /// Raw status text reported by the runtime
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Critical,
}

/// Operator-facing alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn new(level: NotificationLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// The protected database
#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    /// Check the database answers queries
    async fn ping(&self) -> Result<()>;

    /// Client connections other than our own
    async fn active_connections(&self) -> Result<u32>;

    /// Replace the database contents from a plaintext dump
    async fn restore(&self, dump: &Utf8Path) -> Result<()>;

    /// Terminate every client connection; returns how many were closed
    async fn terminate_connections(&self) -> Result<u32>;

    /// Promote the hot standby; returns the host now serving writes
    async fn activate_standby(&self) -> Result<String>;
}

/// The container runtime hosting the application services
#[async_trait]
pub trait ContainerAdapter: Send + Sync {
    async fn ping(&self) -> Result<()>;

    /// Names of the services currently running
    async fn list_services(&self) -> Result<Vec<String>>;

    /// Stop every running service; returns the names stopped
    async fn stop_services(&self, mode: StopMode) -> Result<Vec<String>>;

    /// Start every stopped service; returns the names started
    async fn start_services(&self) -> Result<Vec<String>>;

    async fn restart_service(&self, name: &str) -> Result<()>;

    /// Point services at the images for `version`; returns updated image refs
    async fn update_images(&self, version: &str) -> Result<Vec<String>>;

    async fn service_health(&self) -> Result<Vec<ServiceHealth>>;
}

/// An orchestration platform scheduling workloads (optional)
#[async_trait]
pub trait OrchestrationAdapter: Send + Sync {
    async fn ping(&self) -> Result<()>;

    /// Workloads that are crashed or failed
    async fn failed_workloads(&self) -> Result<Vec<String>>;

    /// Have the platform recreate a workload
    async fn restart_workload(&self, name: &str) -> Result<()>;

    /// Whether every deployment reports available
    async fn rollout_complete(&self) -> Result<bool>;
}

/// DNS and load-balancer control
#[async_trait]
pub trait TrafficAdapter: Send + Sync {
    async fn route_to_version(&self, version: &str) -> Result<()>;

    /// Send application traffic to the backup servers
    async fn switch_to_backup(&self) -> Result<()>;

    /// Point DNS at `target`
    async fn update_dns(&self, target: &str) -> Result<()>;
}

/// The application release under protection
#[async_trait]
pub trait ApplicationAdapter: Send + Sync {
    /// Known release versions, oldest first
    async fn list_versions(&self) -> Result<Vec<String>>;

    /// Currently deployed version, when it can be determined
    async fn current_version(&self) -> Result<Option<String>>;

    /// Switch the code tree to `version`
    async fn checkout(&self, version: &str) -> Result<()>;

    /// Whether the application answers its health endpoint
    async fn health_check(&self) -> Result<bool>;

    /// Run the integration suite; an error carries the failure output
    async fn run_integration_tests(&self) -> Result<()>;
}

/// Alerting and monitoring state
#[async_trait]
pub trait NotificationAdapter: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<()>;

    /// Enter or leave the explicit emergency state
    async fn set_emergency_state(&self, active: bool) -> Result<()>;

    /// Tell monitoring which version is now live
    async fn record_deployment(&self, version: &str) -> Result<()>;
}
