//! System health sampling backed by sysinfo

use lazarus_core::types::HealthMetrics;
use std::time::Duration;
use sysinfo::{Disks, Networks, System};
use tracing::debug;

/// Source of health snapshots
///
/// Implementations perform a single synchronous read of local counters and
/// must not block on remote I/O.
pub trait HealthSource: Send + Sync {
    fn collect_health_metrics(&self) -> HealthMetrics;
}

/// Health monitor reading OS-level counters
#[derive(Debug, Clone)]
pub struct SystemHealthMonitor {
    /// Interval between the two CPU samples needed for a usage figure
    cpu_sample_interval: Duration,
}

impl Default for SystemHealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemHealthMonitor {
    pub fn new() -> Self {
        Self {
            cpu_sample_interval: sysinfo::MINIMUM_CPU_UPDATE_INTERVAL,
        }
    }

    /// Use a custom CPU sampling interval (never shorter than sysinfo's minimum)
    pub fn with_cpu_sample_interval(interval: Duration) -> Self {
        Self {
            cpu_sample_interval: interval.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }

    fn sample_disk_usage() -> Option<f64> {
        let disks = Disks::new_with_refreshed_list();
        let (total, available) = disks.iter().fold((0u64, 0u64), |(t, a), disk| {
            (t + disk.total_space(), a + disk.available_space())
        });

        if total == 0 {
            None
        } else {
            Some(percent(total.saturating_sub(available), total))
        }
    }

    fn sample_network() -> (u64, u64) {
        let networks = Networks::new_with_refreshed_list();
        networks.iter().fold((0u64, 0u64), |(sent, recv), (_, data)| {
            (sent + data.total_transmitted(), recv + data.total_received())
        })
    }
}

impl HealthSource for SystemHealthMonitor {
    fn collect_health_metrics(&self) -> HealthMetrics {
        let mut missing = Vec::new();
        let mut metrics = HealthMetrics::default();

        let mut system = System::new_all();
        std::thread::sleep(self.cpu_sample_interval);
        system.refresh_cpu_usage();

        if system.cpus().is_empty() {
            missing.push("cpu");
        } else {
            metrics.cpu_usage = f64::from(system.global_cpu_usage());
        }

        let total_memory = system.total_memory();
        if total_memory == 0 {
            missing.push("memory");
        } else {
            metrics.memory_usage = percent(system.used_memory(), total_memory);
        }

        match Self::sample_disk_usage() {
            Some(usage) => metrics.disk_usage = usage,
            None => missing.push("disk"),
        }

        let (sent, recv) = Self::sample_network();
        metrics.network_bytes_sent = sent;
        metrics.network_bytes_recv = recv;

        metrics.process_count = system.processes().len();
        if metrics.process_count == 0 {
            missing.push("processes");
        }

        metrics.load_average_1min = System::load_average().one;

        if !missing.is_empty() {
            metrics.error = Some(format!("unavailable counters: {}", missing.join(", ")));
            metrics.unavailable = missing.iter().map(|g| g.to_string()).collect();
        }

        debug!(
            "Health sample: cpu={:.1}% mem={:.1}% disk={:.1}% procs={}",
            metrics.cpu_usage, metrics.memory_usage, metrics.disk_usage, metrics.process_count
        );

        metrics
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
