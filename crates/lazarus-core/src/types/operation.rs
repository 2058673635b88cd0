//! Recovery operation record and its state machine
//!
//! `Initiated -> InProgress -> Verifying -> (Completed | Partial)`, with
//! `Failed` reachable from any non-terminal state. Once terminal, a record
//! rejects every further transition.

use crate::error::{Error, Result};
use crate::types::recovery::{RecoveryStatus, RecoveryType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mutable record of one in-flight or completed recovery operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryOperation {
    operation_id: String,
    recovery_type: RecoveryType,
    status: RecoveryStatus,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    target_recovery_point: Option<String>,
    target_version: Option<String>,
    affected_services: Vec<String>,
    error_message: Option<String>,
    rollback_steps: Vec<String>,
    verification_results: BTreeMap<String, bool>,
}

impl RecoveryOperation {
    /// Create a new operation in the `Initiated` state
    pub fn new(operation_id: impl Into<String>, recovery_type: RecoveryType) -> Self {
        Self {
            operation_id: operation_id.into(),
            recovery_type,
            status: RecoveryStatus::Initiated,
            start_time: Utc::now(),
            end_time: None,
            target_recovery_point: None,
            target_version: None,
            affected_services: Vec::new(),
            error_message: None,
            rollback_steps: Vec::new(),
            verification_results: BTreeMap::new(),
        }
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    pub fn recovery_type(&self) -> RecoveryType {
        self.recovery_type
    }

    pub fn status(&self) -> RecoveryStatus {
        self.status
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn target_recovery_point(&self) -> Option<&str> {
        self.target_recovery_point.as_deref()
    }

    pub fn target_version(&self) -> Option<&str> {
        self.target_version.as_deref()
    }

    pub fn affected_services(&self) -> &[String] {
        &self.affected_services
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn rollback_steps(&self) -> &[String] {
        &self.rollback_steps
    }

    pub fn verification_results(&self) -> &BTreeMap<String, bool> {
        &self.verification_results
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Wall-clock duration, up to now for running operations
    pub fn duration(&self) -> chrono::Duration {
        self.end_time.unwrap_or_else(Utc::now) - self.start_time
    }

    /// Record the version this operation drives toward
    pub fn set_target_version(&mut self, version: impl Into<String>) {
        self.target_version = Some(version.into());
    }

    /// Record the recovery point (by key) this operation drives toward
    pub fn set_target_recovery_point(&mut self, key: impl Into<String>) {
        self.target_recovery_point = Some(key.into());
    }

    /// `Initiated -> InProgress`
    pub fn begin(&mut self) -> Result<()> {
        self.transition(RecoveryStatus::Initiated, RecoveryStatus::InProgress)
    }

    /// Fix the step plan. Allowed once, while the operation is in progress.
    pub fn set_plan(&mut self, steps: Vec<String>) -> Result<()> {
        if self.status != RecoveryStatus::InProgress {
            return Err(Error::invalid_transition(
                &self.operation_id,
                self.status,
                "plan",
            ));
        }
        if !self.rollback_steps.is_empty() {
            return Err(Error::PlanAlreadySet {
                operation_id: self.operation_id.clone(),
            });
        }
        self.rollback_steps = steps;
        Ok(())
    }

    /// Append a touched service/resource; duplicates are ignored
    pub fn record_affected(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.affected_services.contains(&name) {
            self.affected_services.push(name);
        }
    }

    /// `InProgress -> Verifying`
    pub fn start_verification(&mut self) -> Result<()> {
        self.transition(RecoveryStatus::InProgress, RecoveryStatus::Verifying)
    }

    /// Record one post-condition result; only legal while verifying
    pub fn record_verification(&mut self, check: impl Into<String>, passed: bool) -> Result<()> {
        if self.status != RecoveryStatus::Verifying {
            return Err(Error::invalid_transition(
                &self.operation_id,
                self.status,
                "verification",
            ));
        }
        self.verification_results.insert(check.into(), passed);
        Ok(())
    }

    /// `Verifying -> Completed | Partial`, depending on the recorded checks
    pub fn finish_verification(&mut self) -> Result<RecoveryStatus> {
        let failed: Vec<&str> = self
            .verification_results
            .iter()
            .filter(|(_, passed)| !**passed)
            .map(|(name, _)| name.as_str())
            .collect();

        let (next, message) = if failed.is_empty() {
            (RecoveryStatus::Completed, None)
        } else {
            (
                RecoveryStatus::Partial,
                Some(format!("Verification failed: {}", failed.join(", "))),
            )
        };

        self.transition(RecoveryStatus::Verifying, next)?;
        if let Some(message) = message {
            self.error_message.get_or_insert(message);
        }
        Ok(next)
    }

    /// Terminate as `Failed`. The first error message wins.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(Error::invalid_transition(
                &self.operation_id,
                self.status,
                RecoveryStatus::Failed,
            ));
        }
        self.status = RecoveryStatus::Failed;
        self.end_time = Some(Utc::now());
        self.error_message.get_or_insert_with(|| message.into());
        Ok(())
    }

    fn transition(&mut self, from: RecoveryStatus, to: RecoveryStatus) -> Result<()> {
        if self.status != from {
            return Err(Error::invalid_transition(&self.operation_id, self.status, to));
        }
        self.status = to;
        if to.is_terminal() {
            self.end_time = Some(Utc::now());
        }
        Ok(())
    }
}
