//! Utility functions for adapter implementations

use anyhow::{anyhow, Context, Result};
use camino::Utf8Path;
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, warn};

/// Check if a command is available in PATH
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Run a command asynchronously, returning its output whatever the exit status
pub async fn run_command_async(cmd: &str, args: &[&str]) -> Result<Output> {
    debug!("Running async: {} {}", cmd, args.join(" "));

    let output = Command::new(cmd)
        .args(args)
        .output()
        .await
        .with_context(|| format!("Failed to run {}", cmd))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(
            "Command failed: {} {}\nStderr: {}",
            cmd,
            args.join(" "),
            stderr.trim()
        );
    }

    Ok(output)
}

/// Run a command and return trimmed stdout; non-zero exit is an error carrying stderr
pub async fn run_checked(cmd: &str, args: &[&str]) -> Result<String> {
    let output = run_command_async(cmd, args).await?;
    into_stdout(cmd, output)
}

/// Run a shell snippet with `sh -c`, optionally from a working directory
pub async fn run_shell(script: &str, cwd: Option<&Utf8Path>) -> Result<String> {
    debug!("Running hook: {}", script);

    let mut command = Command::new("sh");
    command.arg("-c").arg(script);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let output = command
        .output()
        .await
        .with_context(|| format!("Failed to run hook: {}", script))?;
    into_stdout(script, output)
}

fn into_stdout(what: &str, output: Output) -> Result<String> {
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(anyhow!(
            "{} exited with {}: {}",
            what,
            output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string()),
            last_lines(stderr.trim(), 20)
        ))
    }
}

/// Substitute `{version}` in a hook template
pub fn substitute_version(template: &str, version: &str) -> String {
    template.replace("{version}", version)
}

fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_version() {
        assert_eq!(
            substitute_version("lb-route --to app-{version}", "v1.2.0"),
            "lb-route --to app-v1.2.0"
        );
        assert_eq!(substitute_version("switch", "v1"), "switch");
    }

    #[test]
    fn test_last_lines() {
        assert_eq!(last_lines("a\nb\nc", 2), "b\nc");
        assert_eq!(last_lines("a", 5), "a");
    }

    #[tokio::test]
    async fn test_run_shell_reports_stderr() {
        let err = run_shell("echo boom >&2; exit 3", None).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("exited with 3"));
        assert!(message.contains("boom"));
    }

    #[tokio::test]
    async fn test_run_shell_stdout() {
        assert_eq!(run_shell("echo ok", None).await.unwrap(), "ok");
    }
}
