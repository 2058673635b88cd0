//! Pre-rollback feasibility validation
//!
//! Every check runs even after an earlier one fails, so the operator sees the
//! full list of unmet conditions at once.

use crate::context::Adapters;
use lazarus_adapters::{parse_version, sort_versions};
use lazarus_core::types::{HealthMetrics, RecoveryPoint, RecoverySettings, ResourceThresholds};
use serde::Serialize;
use tracing::{debug, warn};

/// Outcome of one feasibility check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub name: &'static str,
    pub passed: bool,
    /// Why the check failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CheckOutcome {
    fn pass(name: &'static str) -> Self {
        Self {
            name,
            passed: true,
            reason: None,
        }
    }

    fn fail(name: &'static str, reason: impl Into<String>) -> Self {
        Self {
            name,
            passed: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FeasibilityReport {
    pub checks: Vec<CheckOutcome>,
}

impl FeasibilityReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.checks.iter().filter(|c| !c.passed)
    }

    /// Operator-facing message naming every unmet condition
    pub fn failure_summary(&self) -> String {
        let reasons: Vec<&str> = self
            .failures()
            .map(|c| c.reason.as_deref().unwrap_or(c.name))
            .collect();
        format!("Rollback validation failed: {}", reasons.join("; "))
    }
}

/// Validate that rolling back to `target_version` is safe right now
pub async fn validate_rollback(
    adapters: &Adapters,
    settings: &RecoverySettings,
    thresholds: &ResourceThresholds,
    target_version: &str,
    point: Option<&RecoveryPoint>,
) -> FeasibilityReport {
    let mut report = FeasibilityReport::default();

    let versions = match adapters.application.list_versions().await {
        Ok(versions) => versions,
        Err(e) => {
            warn!("Could not list application versions: {:#}", e);
            Vec::new()
        }
    };
    let current = match adapters.application.current_version().await {
        Ok(current) => current.or_else(|| versions.last().cloned()),
        Err(e) => {
            warn!("Could not determine current version: {:#}", e);
            versions.last().cloned()
        }
    };
    debug!(
        "Feasibility: {} known versions, current {:?}, target {}",
        versions.len(),
        current,
        target_version
    );

    let target_known = versions.iter().any(|v| v == target_version)
        || point.is_some_and(|p| p.deployment_version == target_version);
    report.checks.push(if target_known {
        CheckOutcome::pass("target_exists")
    } else {
        CheckOutcome::fail(
            "target_exists",
            format!("Target version {} not found", target_version),
        )
    });

    report.checks.push(check_depth(
        &versions,
        current.as_deref(),
        target_version,
        target_known,
        settings.max_rollback_depth,
    ));
    report
        .checks
        .push(check_schema(current.as_deref(), target_version, point));
    report
        .checks
        .push(check_resources(adapters, thresholds).await);

    report
        .checks
        .push(match adapters.database.active_connections().await {
            Ok(count) if count < settings.max_active_connections => {
                CheckOutcome::pass("database_connections")
            }
            Ok(count) => CheckOutcome::fail(
                "database_connections",
                format!(
                    "{} active database connections (limit {})",
                    count, settings.max_active_connections
                ),
            ),
            Err(e) => CheckOutcome::fail(
                "database_connections",
                format!("Could not count database connections: {:#}", e),
            ),
        });

    report
}

/// Number of releases between current and target, in semver order
fn rollback_depth(versions: &[String], current: &str, target: &str) -> Option<usize> {
    let mut known = versions.to_vec();
    known.push(current.to_string());
    known.push(target.to_string());
    let ordered = sort_versions(known);

    let from = ordered.iter().position(|v| v == current)?;
    let to = ordered.iter().position(|v| v == target)?;
    Some(from.abs_diff(to))
}

fn check_depth(
    versions: &[String],
    current: Option<&str>,
    target: &str,
    target_known: bool,
    max_depth: usize,
) -> CheckOutcome {
    // Unknown targets are reported by target_exists alone
    let Some(current) = current.filter(|_| target_known) else {
        return CheckOutcome::pass("rollback_depth");
    };
    match rollback_depth(versions, current, target) {
        Some(depth) if depth > max_depth => CheckOutcome::fail(
            "rollback_depth",
            format!(
                "Rollback depth {} from {} to {} exceeds maximum of {}",
                depth, current, target, max_depth
            ),
        ),
        Some(_) => CheckOutcome::pass("rollback_depth"),
        None => {
            debug!("Rollback depth not computable for {} -> {}", current, target);
            CheckOutcome::pass("rollback_depth")
        }
    }
}

fn check_schema(current: Option<&str>, target: &str, point: Option<&RecoveryPoint>) -> CheckOutcome {
    if point.is_some_and(RecoveryPoint::has_database_backup) {
        return CheckOutcome::pass("schema_compatibility");
    }
    let current = current.and_then(parse_version);
    match (current, parse_version(target)) {
        (Some(current), Some(target)) if current.major != target.major => CheckOutcome::fail(
            "schema_compatibility",
            format!(
                "No database backup for {} and major version changes ({} -> {}); schema may be incompatible",
                target, current.major, target.major
            ),
        ),
        _ => CheckOutcome::pass("schema_compatibility"),
    }
}

async fn check_resources(adapters: &Adapters, thresholds: &ResourceThresholds) -> CheckOutcome {
    let metrics = adapters.collect_health().await;
    if let Some(error) = &metrics.error {
        warn!("Health metrics are partial: {}", error);
    }

    resource_outcome(&metrics, thresholds)
}

fn resource_outcome(metrics: &HealthMetrics, thresholds: &ResourceThresholds) -> CheckOutcome {
    let mut unmeasured = Vec::new();
    let mut exceeded = Vec::new();
    for (gauge, label, value, limit) in [
        ("cpu", "CPU", metrics.cpu_usage, thresholds.max_cpu_percent),
        ("memory", "memory", metrics.memory_usage, thresholds.max_memory_percent),
        ("disk", "disk", metrics.disk_usage, thresholds.max_disk_percent),
    ] {
        if !metrics.has_gauge(gauge) {
            unmeasured.push(label);
        } else if value > limit {
            exceeded.push(format!("{} usage {:.1}% above {:.1}%", label, value, limit));
        }
    }

    if !unmeasured.is_empty() {
        return CheckOutcome::fail(
            "system_resources",
            format!(
                "Could not measure {} usage; use --force to skip validation",
                unmeasured.join(", ")
            ),
        );
    }
    if exceeded.is_empty() {
        CheckOutcome::pass("system_resources")
    } else {
        CheckOutcome::fail(
            "system_resources",
            format!("Insufficient system resources: {}", exceeded.join(", ")),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn versions(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_depth_counts_releases_between() {
        let known = versions(&["v1.0.0", "v1.1.0", "v1.2.0", "v1.3.0"]);
        assert_eq!(rollback_depth(&known, "v1.3.0", "v1.0.0"), Some(3));
        assert_eq!(rollback_depth(&known, "v1.3.0", "v1.3.0"), Some(0));
    }

    #[test]
    fn test_depth_ceiling() {
        let known = versions(&["v1.0.0", "v1.1.0", "v1.2.0", "v1.3.0"]);
        assert!(!check_depth(&known, Some("v1.3.0"), "v1.0.0", true, 2).passed);
        assert!(check_depth(&known, Some("v1.3.0"), "v1.1.0", true, 2).passed);
    }

    #[test]
    fn test_schema_major_change_without_backup() {
        assert!(!check_schema(Some("v2.0.0"), "v1.9.0", None).passed);
        assert!(check_schema(Some("v1.4.0"), "v1.1.0", None).passed);
    }

    #[test]
    fn test_unmeasured_gauge_fails_resources() {
        let thresholds = ResourceThresholds::default();
        let metrics = HealthMetrics {
            cpu_usage: 10.0,
            memory_usage: 20.0,
            error: Some("unavailable counters: disk".to_string()),
            unavailable: vec!["disk".to_string()],
            ..Default::default()
        };
        let outcome = resource_outcome(&metrics, &thresholds);
        assert!(!outcome.passed);
        assert!(outcome.reason.unwrap().contains("Could not measure disk"));

        let failed_sample = HealthMetrics {
            error: Some("health sampling task failed".to_string()),
            ..Default::default()
        };
        let outcome = resource_outcome(&failed_sample, &thresholds);
        assert!(outcome.reason.unwrap().contains("CPU, memory, disk"));
    }

    #[test]
    fn test_missing_process_count_does_not_block() {
        let metrics = HealthMetrics {
            cpu_usage: 10.0,
            memory_usage: 20.0,
            disk_usage: 30.0,
            error: Some("unavailable counters: processes".to_string()),
            unavailable: vec!["processes".to_string()],
            ..Default::default()
        };
        assert!(resource_outcome(&metrics, &ResourceThresholds::default()).passed);
    }

    #[test]
    fn test_summary_names_every_failure() {
        let report = FeasibilityReport {
            checks: vec![
                CheckOutcome::fail("target_exists", "Target version v9 not found"),
                CheckOutcome::pass("rollback_depth"),
                CheckOutcome::fail("system_resources", "disk full"),
            ],
        };
        assert!(!report.passed());
        assert_eq!(
            report.failure_summary(),
            "Rollback validation failed: Target version v9 not found; disk full"
        );
    }
}
