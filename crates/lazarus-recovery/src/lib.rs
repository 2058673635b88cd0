//! # lazarus-recovery
//!
//! Recovery point persistence and the recovery orchestrator:
//! - Dual-target recovery point store (JSON files plus an expiring cache)
//! - Rollback with feasibility gate, safety point, fixed step plan, step-local
//!   recovery and emergency restore
//! - Disaster-recovery strategies per recovery type
//! - Named resource locks, parallel ceiling and operation history
//! - Connectivity checks
//! - Read-only status view over persisted state

pub mod context;
pub mod error;
pub mod feasibility;
pub mod health;
pub mod history;
pub mod ids;
pub mod lock;
pub mod orchestrator;
pub mod plan;
pub mod status;
pub mod store;
pub mod strategy;
pub mod verification;

pub use context::{Adapters, Snapshotter};
pub use error::{RecoveryError, Result};
pub use feasibility::{CheckOutcome, FeasibilityReport};
pub use health::{CheckState, ConnectivityCheck};
pub use lock::{LockGuard, Resource, ResourceLocks};
pub use orchestrator::RecoveryOrchestrator;
pub use plan::{plan_rollback_steps, RollbackStep};
pub use status::{StatusReader, StatusReport};
pub use store::{CacheTarget, CleanupReport, MemoryCache, RecoveryPointStore, RedisCache};
pub use strategy::{DisasterAction, DisasterStrategy, StepResult};
pub use verification::VerificationCheck;
