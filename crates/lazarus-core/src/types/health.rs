//! Health metric types

use serde::{Deserialize, Serialize};

/// Best-effort snapshot of host health.
///
/// Any gauge the monitor could not read is left at its default, named in
/// `unavailable` and the reason is recorded in `error`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthMetrics {
    /// Global CPU utilisation in percent
    pub cpu_usage: f64,

    /// Used memory in percent of total
    pub memory_usage: f64,

    /// Used disk space in percent of total, across all mounted disks
    pub disk_usage: f64,

    /// Bytes sent across all interfaces since boot
    pub network_bytes_sent: u64,

    /// Bytes received across all interfaces since boot
    pub network_bytes_recv: u64,

    /// Number of running processes
    pub process_count: usize,

    /// One-minute load average
    pub load_average_1min: f64,

    /// Why some gauges are missing, if any are
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Gauges that could not be read: `cpu`, `memory`, `disk`, `processes`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unavailable: Vec<String>,
}

impl HealthMetrics {
    /// True when at least one counter could not be gathered
    pub fn is_partial(&self) -> bool {
        self.error.is_some()
    }

    /// Whether a gauge holds a real reading. A partial sample that does not
    /// name its missing gauges has none.
    pub fn has_gauge(&self, gauge: &str) -> bool {
        if self.error.is_none() {
            return true;
        }
        !self.unavailable.is_empty() && !self.unavailable.iter().any(|g| g == gauge)
    }
}
