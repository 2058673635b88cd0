//! Cleanup command

use anyhow::Result;
use camino::Utf8Path;
use std::process::ExitCode;

use crate::cli::CleanupArgs;
use crate::output;
use crate::runtime;

pub async fn run(args: CleanupArgs, config_path: Option<&Utf8Path>) -> Result<ExitCode> {
    let runtime = runtime::init(config_path).await?;
    let retention = &runtime.config.inner().storage.retention;

    let report = runtime.orchestrator.cleanup(args.dry_run).await?;

    if report.is_empty() {
        output::success(&format!(
            "Nothing to clean up ({} day / {} per version retention)",
            retention.days, retention.versions
        ));
        return Ok(ExitCode::SUCCESS);
    }

    let verb = if report.dry_run { "Would remove" } else { "Removed" };
    output::header(if report.dry_run {
        "Cleanup (dry run)"
    } else {
        "Cleanup"
    });
    for key in &report.expired_points {
        output::kv("expired", key);
    }
    for key in &report.excess_points {
        output::kv("over version limit", key);
    }
    for id in &report.operations_removed {
        output::kv("operation", id);
    }

    println!();
    output::success(&format!(
        "{} {} recovery points, {} operation records",
        verb,
        report.points_removed(),
        report.operations_removed.len()
    ));
    if !report.dry_run {
        output::kv("Artifacts deleted", &report.artifacts_removed.to_string());
    }

    Ok(ExitCode::SUCCESS)
}
