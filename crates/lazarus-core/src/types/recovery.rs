//! Recovery point model and recovery enumerations

use crate::error::Error;
use crate::types::health::HealthMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Timestamp layout used as the identity key of a recovery point
pub const RECOVERY_POINT_KEY_FORMAT: &str = "%Y%m%dT%H%M%S%.6fZ";

/// Kind of recovery operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryType {
    Rollback,
    Failover,
    Restore,
    EmergencyStop,
    DataRecovery,
    ServiceRecovery,
    InfrastructureRecovery,
}

impl RecoveryType {
    /// Every recovery type, in declaration order
    pub const ALL: [RecoveryType; 7] = [
        RecoveryType::Rollback,
        RecoveryType::Failover,
        RecoveryType::Restore,
        RecoveryType::EmergencyStop,
        RecoveryType::DataRecovery,
        RecoveryType::ServiceRecovery,
        RecoveryType::InfrastructureRecovery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryType::Rollback => "rollback",
            RecoveryType::Failover => "failover",
            RecoveryType::Restore => "restore",
            RecoveryType::EmergencyStop => "emergency_stop",
            RecoveryType::DataRecovery => "data_recovery",
            RecoveryType::ServiceRecovery => "service_recovery",
            RecoveryType::InfrastructureRecovery => "infrastructure_recovery",
        }
    }
}

impl fmt::Display for RecoveryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecoveryType {
    type Err = Error;

    /// Case-insensitive; accepts `-` in place of `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        RecoveryType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| Error::invalid_recovery_type(s))
    }
}

/// State of a recovery operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStatus {
    Initiated,
    InProgress,
    Verifying,
    Completed,
    Failed,
    Partial,
    RolledBack,
}

impl RecoveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryStatus::Initiated => "initiated",
            RecoveryStatus::InProgress => "in_progress",
            RecoveryStatus::Verifying => "verifying",
            RecoveryStatus::Completed => "completed",
            RecoveryStatus::Failed => "failed",
            RecoveryStatus::Partial => "partial",
            RecoveryStatus::RolledBack => "rolled_back",
        }
    }

    /// Terminal states never change once reached
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RecoveryStatus::Completed
                | RecoveryStatus::Failed
                | RecoveryStatus::Partial
                | RecoveryStatus::RolledBack
        )
    }
}

impl fmt::Display for RecoveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inventory of running services at capture time. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesState {
    /// Names of the containers/services that were running
    pub containers: Vec<String>,

    /// Host process count
    pub process_count: usize,

    /// Open database connections, when the database answered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_connections: Option<u32>,
}

/// Immutable point-in-time snapshot descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryPoint {
    /// Creation instant, also the identity key
    pub timestamp: DateTime<Utc>,

    /// Deployment version label this point corresponds to
    pub deployment_version: String,

    /// Locator of the database dump
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_backup_ref: Option<String>,

    /// Locator of the application code snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_snapshot_ref: Option<String>,

    /// Locator of the configuration snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_snapshot_ref: Option<String>,

    #[serde(default)]
    pub services_state: ServicesState,

    #[serde(default)]
    pub health_metrics: HealthMetrics,

    /// Provenance: the operation kind this point was created for
    pub recovery_type: RecoveryType,

    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl RecoveryPoint {
    /// Identity key derived from the timestamp
    pub fn key(&self) -> String {
        recovery_point_key(&self.timestamp)
    }

    /// Every artifact locator the point references
    pub fn artifact_refs(&self) -> impl Iterator<Item = &str> {
        [
            self.database_backup_ref.as_deref(),
            self.code_snapshot_ref.as_deref(),
            self.config_snapshot_ref.as_deref(),
        ]
        .into_iter()
        .flatten()
    }

    /// Whether the point carries a database dump
    pub fn has_database_backup(&self) -> bool {
        self.database_backup_ref.is_some()
    }
}

/// Format a timestamp as a recovery point key
pub fn recovery_point_key(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(RECOVERY_POINT_KEY_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_point() -> RecoveryPoint {
        RecoveryPoint {
            timestamp: "2026-03-01T12:30:45.123456Z".parse().unwrap(),
            deployment_version: "v1.4.0".to_string(),
            database_backup_ref: Some("/backups/database/db.dump.enc".to_string()),
            code_snapshot_ref: None,
            config_snapshot_ref: Some("/backups/config_snapshots/cfg.tar.gz.enc".to_string()),
            services_state: ServicesState::default(),
            health_metrics: HealthMetrics::default(),
            recovery_type: RecoveryType::Rollback,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn test_recovery_type_parse_is_case_insensitive() {
        assert_eq!(
            "EMERGENCY_STOP".parse::<RecoveryType>().unwrap(),
            RecoveryType::EmergencyStop
        );
        assert_eq!(
            "data-recovery".parse::<RecoveryType>().unwrap(),
            RecoveryType::DataRecovery
        );
        assert!("reboot".parse::<RecoveryType>().is_err());
    }

    #[test]
    fn test_recovery_type_serde_names() {
        let json = serde_json::to_string(&RecoveryType::InfrastructureRecovery).unwrap();
        assert_eq!(json, "\"infrastructure_recovery\"");
    }

    #[test]
    fn test_terminal_states() {
        assert!(RecoveryStatus::Completed.is_terminal());
        assert!(RecoveryStatus::Failed.is_terminal());
        assert!(RecoveryStatus::Partial.is_terminal());
        assert!(!RecoveryStatus::Verifying.is_terminal());
        assert!(!RecoveryStatus::Initiated.is_terminal());
    }

    #[test]
    fn test_point_key_uses_timestamp() {
        let point = sample_point();
        assert_eq!(point.key(), "20260301T123045.123456Z");
    }

    #[test]
    fn test_artifact_refs_skips_missing() {
        let point = sample_point();
        let refs: Vec<&str> = point.artifact_refs().collect();
        assert_eq!(refs.len(), 2);
        assert!(point.has_database_backup());
    }

    #[test]
    fn test_point_json_is_stable() {
        let point = sample_point();
        let first = serde_json::to_string_pretty(&point).unwrap();
        let reparsed: RecoveryPoint = serde_json::from_str(&first).unwrap();
        let second = serde_json::to_string_pretty(&reparsed).unwrap();
        assert_eq!(first, second);
    }
}
