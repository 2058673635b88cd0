//! Disaster recovery command

use anyhow::Result;
use camino::Utf8Path;
use std::process::ExitCode;

use super::report_operation;
use crate::cli::DisasterRecoveryArgs;
use crate::output;
use crate::runtime;

pub async fn run(args: DisasterRecoveryArgs, config_path: Option<&Utf8Path>) -> Result<ExitCode> {
    let runtime = runtime::init(config_path).await?;

    if args.emergency {
        output::emergency_banner(&format!(
            "EMERGENCY {} IN PROGRESS",
            args.recovery_type.as_str().to_uppercase()
        ));
    }

    let spinner = output::spinner(&format!("Running {} recovery", args.recovery_type));
    let operation = runtime
        .orchestrator
        .execute_disaster_recovery(
            args.recovery_type,
            args.recovery_point.as_deref(),
            args.emergency,
        )
        .await;
    spinner.finish_and_clear();

    Ok(report_operation(&operation))
}
