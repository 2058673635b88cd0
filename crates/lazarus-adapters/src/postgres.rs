//! PostgreSQL adapter driving the psql / pg_restore client tools

use crate::traits::DatabaseAdapter;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use camino::Utf8Path;
use lazarus_core::types::DatabaseConfig;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Database adapter for PostgreSQL
#[derive(Debug, Clone)]
pub struct PostgresAdapter {
    config: DatabaseConfig,
}

impl PostgresAdapter {
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    /// Connection arguments for `host`
    fn connection_args(&self, host: &str) -> Vec<String> {
        vec![
            "-h".to_string(),
            host.to_string(),
            "-p".to_string(),
            self.config.port.to_string(),
            "-U".to_string(),
            self.config.user.clone(),
            "-d".to_string(),
            self.config.name.clone(),
        ]
    }

    /// Arguments for a single unaligned, tuples-only query
    fn query_args(&self, host: &str, sql: &str) -> Vec<String> {
        let mut args = self.connection_args(host);
        args.extend(
            ["-X", "-A", "-t", "-v", "ON_ERROR_STOP=1", "-c", sql]
                .iter()
                .map(|s| s.to_string()),
        );
        args
    }

    fn command(&self, tool: &str, args: &[String]) -> Command {
        let mut command = Command::new(tool);
        command.args(args);
        if let Ok(password) = std::env::var(&self.config.password_env) {
            command.env("PGPASSWORD", password);
        }
        command
    }

    async fn query(&self, host: &str, sql: &str) -> Result<String> {
        let args = self.query_args(host, sql);
        debug!("psql -h {} -c {}", host, sql);

        let output = self
            .command(&self.config.client_tool, &args)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.config.client_tool))?;

        if !output.status.success() {
            return Err(anyhow!(
                "Query against {} failed: {}",
                host,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Predicate selecting other sessions on the configured database
    fn other_sessions_filter(&self) -> String {
        format!(
            "datname = '{}' AND pid <> pg_backend_pid()",
            self.config.name.replace('\'', "''")
        )
    }
}

#[async_trait]
impl DatabaseAdapter for PostgresAdapter {
    async fn ping(&self) -> Result<()> {
        self.query(&self.config.host, "SELECT 1").await.map(|_| ())
    }

    async fn active_connections(&self) -> Result<u32> {
        let sql = format!(
            "SELECT count(*) FROM pg_stat_activity WHERE {}",
            self.other_sessions_filter()
        );
        let out = self.query(&self.config.host, &sql).await?;
        parse_count(&out)
    }

    async fn restore(&self, dump: &Utf8Path) -> Result<()> {
        let mut args = self.connection_args(&self.config.host);
        args.extend(
            ["--clean", "--if-exists", "--no-owner", "--exit-on-error"]
                .iter()
                .map(|s| s.to_string()),
        );
        args.push(dump.to_string());

        info!("Restoring database {} from {}", self.config.name, dump);
        let output = self
            .command(&self.config.restore_tool, &args)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.config.restore_tool))?;

        if !output.status.success() {
            return Err(anyhow!(
                "{} failed: {}",
                self.config.restore_tool,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(())
    }

    async fn terminate_connections(&self) -> Result<u32> {
        let sql = format!(
            "SELECT count(pg_terminate_backend(pid)) FROM pg_stat_activity WHERE {}",
            self.other_sessions_filter()
        );
        let closed = parse_count(&self.query(&self.config.host, &sql).await?)?;
        info!("Terminated {} database connections", closed);
        Ok(closed)
    }

    async fn activate_standby(&self) -> Result<String> {
        let standby = self
            .config
            .standby_host
            .clone()
            .ok_or_else(|| anyhow!("No standby database configured (database.standby_host)"))?;

        let promoted = self.query(&standby, "SELECT pg_promote(true, 60)").await?;
        if promoted != "t" {
            warn!("pg_promote on {} returned '{}'", standby, promoted);
            return Err(anyhow!("Standby {} did not confirm promotion", standby));
        }
        info!("Promoted standby database {}", standby);
        Ok(standby)
    }
}

fn parse_count(output: &str) -> Result<u32> {
    output
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .parse()
        .with_context(|| format!("Unexpected count output: '{}'", output))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> PostgresAdapter {
        PostgresAdapter::new(DatabaseConfig {
            name: "o'brien".to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_query_args_are_unaligned_and_fail_fast() {
        let args = adapter().query_args("db1", "SELECT 1");
        assert_eq!(&args[..2], &["-h".to_string(), "db1".to_string()]);
        assert!(args.contains(&"-A".to_string()));
        assert!(args.contains(&"ON_ERROR_STOP=1".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("SELECT 1"));
    }

    #[test]
    fn test_database_name_is_quoted() {
        assert!(adapter()
            .other_sessions_filter()
            .contains("datname = 'o''brien'"));
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("12\n").unwrap(), 12);
        assert!(parse_count("ERROR").is_err());
    }

    #[tokio::test]
    async fn test_standby_required_for_failover() {
        let err = adapter().activate_standby().await.unwrap_err();
        assert!(err.to_string().contains("standby"));
    }
}
