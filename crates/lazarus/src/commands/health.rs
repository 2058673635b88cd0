//! Health command: connectivity to every dependency plus host gauges

use anyhow::Result;
use camino::Utf8Path;
use lazarus_recovery::{CheckState, ConnectivityCheck};
use std::process::ExitCode;

use crate::cli::HealthArgs;
use crate::output;
use crate::runtime;

pub async fn run(args: HealthArgs, config_path: Option<&Utf8Path>) -> Result<ExitCode> {
    let runtime = runtime::init(config_path).await?;

    let spinner = output::spinner("Checking connectivity");
    let mut checks = runtime.orchestrator.check_connectivity().await;
    let host = runtime.orchestrator.adapters().collect_health().await;
    spinner.finish_and_clear();

    // A cache that refused the initial connection is not in the store
    if let Some(error) = &runtime.cache_error {
        checks.retain(|c| c.name != "cache");
        checks.push(ConnectivityCheck {
            name: "cache",
            state: CheckState::Failed,
            detail: error.clone(),
        });
    }

    let healthy = !checks.iter().any(ConnectivityCheck::is_failure);

    if args.json {
        let report = serde_json::json!({
            "healthy": healthy,
            "checks": checks,
            "host": host,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        output::header("Connectivity");
        for check in &checks {
            let line = format!("{}: {}", check.name, check.detail);
            match check.state {
                CheckState::Ok => output::success(&line),
                CheckState::Skipped => output::info(&line),
                CheckState::Failed => output::error(&line),
            }
        }

        output::header("Host");
        output::kv("CPU", &format!("{:.1}%", host.cpu_usage));
        output::kv("Memory", &format!("{:.1}%", host.memory_usage));
        output::kv("Disk", &format!("{:.1}%", host.disk_usage));
        output::kv("Load (1m)", &format!("{:.2}", host.load_average_1min));
        output::kv("Processes", &host.process_count.to_string());
        if let Some(error) = &host.error {
            output::warning(&format!("Some gauges unavailable: {}", error));
        }
    }

    Ok(if healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
