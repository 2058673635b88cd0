//! Command implementations

pub mod cleanup;
pub mod disaster;
pub mod health;
pub mod list;
pub mod recovery_point;
pub mod rollback;
pub mod status;

use crate::output;
use lazarus_core::types::{RecoveryOperation, RecoveryStatus};
use std::process::ExitCode;

/// Exit code for operations that finished with failed verification checks
pub const EXIT_PARTIAL: u8 = 3;

/// Print the outcome of a rollback or disaster-recovery operation and map
/// its final status to an exit code
pub(crate) fn report_operation(operation: &RecoveryOperation) -> ExitCode {
    output::header(&format!("Operation {}", operation.operation_id()));
    output::kv("Type", operation.recovery_type().as_str());
    output::kv("Status", operation.status().as_str());
    if let Some(version) = operation.target_version() {
        output::kv("Target version", version);
    }
    if let Some(point) = operation.target_recovery_point() {
        output::kv("Recovery point", point);
    }
    output::kv(
        "Duration",
        &format!("{}s", operation.duration().num_seconds()),
    );
    if !operation.affected_services().is_empty() {
        output::kv("Affected", &operation.affected_services().join(", "));
    }

    if !operation.verification_results().is_empty() {
        output::header("Verification");
        for (check, passed) in operation.verification_results() {
            if *passed {
                output::success(check);
            } else {
                output::error(check);
            }
        }
    }

    println!();
    let reason = operation.error_message().unwrap_or("no details recorded");
    match operation.status() {
        RecoveryStatus::Completed => {
            output::success("Operation completed");
            ExitCode::SUCCESS
        }
        RecoveryStatus::Partial => {
            output::warning(&format!("Operation partially completed: {}", reason));
            ExitCode::from(EXIT_PARTIAL)
        }
        _ => {
            output::error(&format!("Operation failed: {}", reason));
            ExitCode::FAILURE
        }
    }
}

/// Render an RFC 3339 timestamp the way tables show it
pub(crate) fn short_time(time: &chrono::DateTime<chrono::Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}
