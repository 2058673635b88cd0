//! List-recovery-points command

use anyhow::Result;
use camino::Utf8Path;
use lazarus_core::types::RecoveryPoint;
use std::process::ExitCode;
use tabled::{settings::Style, Table, Tabled};

use super::short_time;
use crate::cli::ListRecoveryPointsArgs;
use crate::output;
use crate::runtime;

#[derive(Tabled)]
pub(crate) struct PointRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Type")]
    recovery_type: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Artifacts")]
    artifacts: String,
}

impl From<&RecoveryPoint> for PointRow {
    fn from(point: &RecoveryPoint) -> Self {
        let mut artifacts = Vec::new();
        if point.database_backup_ref.is_some() {
            artifacts.push("db");
        }
        if point.code_snapshot_ref.is_some() {
            artifacts.push("code");
        }
        if point.config_snapshot_ref.is_some() {
            artifacts.push("config");
        }

        Self {
            key: point.key(),
            version: point.deployment_version.clone(),
            recovery_type: point.recovery_type.to_string(),
            created: short_time(&point.timestamp),
            artifacts: if artifacts.is_empty() {
                "-".to_string()
            } else {
                artifacts.join(",")
            },
        }
    }
}

pub(crate) fn print_points(points: &[RecoveryPoint]) {
    let rows: Vec<PointRow> = points.iter().map(PointRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::sharp());
    println!("{}", table);
}

pub async fn run(args: ListRecoveryPointsArgs, config_path: Option<&Utf8Path>) -> Result<ExitCode> {
    let runtime = runtime::init(config_path).await?;

    let mut points = runtime.orchestrator.list_recovery_points(args.days).await?;
    if let Some(limit) = args.limit {
        points.truncate(limit);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&points)?);
        return Ok(ExitCode::SUCCESS);
    }

    if points.is_empty() {
        output::info(&format!(
            "No recovery points in the last {} days",
            args.days
        ));
        return Ok(ExitCode::SUCCESS);
    }

    output::header(&format!("Recovery points (last {} days)", args.days));
    print_points(&points);

    Ok(ExitCode::SUCCESS)
}
