//! Lazarus Health Monitor
//!
//! Provides a best-effort snapshot of host health (CPU, memory, disk,
//! network counters, process count, load average). Sampling never fails:
//! gauges that cannot be read are reported through the `error` field of
//! [`HealthMetrics`] instead.

pub mod monitor;

pub use lazarus_core::types::HealthMetrics;
pub use monitor::{HealthSource, SystemHealthMonitor};
