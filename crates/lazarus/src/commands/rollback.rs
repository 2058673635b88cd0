//! Rollback command

use anyhow::Result;
use camino::Utf8Path;
use dialoguer::Confirm;
use std::process::ExitCode;

use super::report_operation;
use crate::cli::RollbackArgs;
use crate::output;
use crate::runtime;

pub async fn run(args: RollbackArgs, config_path: Option<&Utf8Path>) -> Result<ExitCode> {
    let runtime = runtime::init(config_path).await?;

    if !args.force && !args.non_interactive {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Roll back to {}? Services are stopped while the rollback runs",
                args.target_version
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            output::info("Rollback cancelled");
            return Ok(ExitCode::FAILURE);
        }
    }

    if args.force {
        output::warning("Skipping rollback validation (--force); a safety point is still captured");
    }

    let spinner = output::spinner(&format!("Rolling back to {}", args.target_version));
    let operation = runtime
        .orchestrator
        .execute_rollback(&args.target_version, args.recovery_point.as_deref(), args.force)
        .await;
    spinner.finish_and_clear();

    if !operation.rollback_steps().is_empty() {
        output::header("Plan");
        for (i, step) in operation.rollback_steps().iter().enumerate() {
            println!("  {:>2}. {}", i + 1, step);
        }
    }

    Ok(report_operation(&operation))
}
