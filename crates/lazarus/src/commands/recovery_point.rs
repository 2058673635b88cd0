//! Create-recovery-point command

use anyhow::{Context, Result};
use camino::Utf8Path;
use std::process::ExitCode;

use crate::cli::CreateRecoveryPointArgs;
use crate::output;
use crate::runtime;

pub async fn run(args: CreateRecoveryPointArgs, config_path: Option<&Utf8Path>) -> Result<ExitCode> {
    let runtime = runtime::init(config_path).await?;

    let spinner = output::spinner(&format!("Capturing recovery point for {}", args.deployment_version));
    let result = runtime
        .orchestrator
        .create_recovery_point(&args.deployment_version, args.recovery_type)
        .await;
    spinner.finish_and_clear();
    let point = result.context("Failed to create recovery point")?;

    output::success(&format!("Recovery point {} created", point.key()));
    output::kv("Version", &point.deployment_version);
    output::kv("Type", point.recovery_type.as_str());
    output::kv("Database", point.database_backup_ref.as_deref().unwrap_or("-"));
    output::kv("Code", point.code_snapshot_ref.as_deref().unwrap_or("-"));
    output::kv("Config", point.config_snapshot_ref.as_deref().unwrap_or("-"));
    if !point.services_state.containers.is_empty() {
        output::kv("Services", &point.services_state.containers.join(", "));
    }

    Ok(ExitCode::SUCCESS)
}
