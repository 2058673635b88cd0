//! Traffic adapter running operator-supplied DNS / load-balancer hooks

use crate::traits::TrafficAdapter;
use crate::utils::{run_shell, substitute_version};
use anyhow::Result;
use async_trait::async_trait;
use lazarus_core::types::TrafficConfig;
use tracing::{info, warn};

/// Runs the `traffic.*_command` hooks through `sh -c`.
///
/// An unconfigured hook is a no-op: environments without a load balancer
/// have nothing to switch.
#[derive(Debug, Clone)]
pub struct CommandTrafficAdapter {
    config: TrafficConfig,
}

impl CommandTrafficAdapter {
    pub fn new(config: TrafficConfig) -> Self {
        Self { config }
    }

    async fn run_hook(&self, label: &str, hook: Option<&String>, value: &str) -> Result<()> {
        match hook {
            Some(template) => {
                let command = substitute_version(template, value);
                let output = run_shell(&command, None).await?;
                if output.is_empty() {
                    info!("{} hook completed", label);
                } else {
                    info!("{} hook completed: {}", label, output);
                }
                Ok(())
            }
            None => {
                warn!("No {} hook configured; skipping", label);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl TrafficAdapter for CommandTrafficAdapter {
    async fn route_to_version(&self, version: &str) -> Result<()> {
        self.run_hook("traffic.route_command", self.config.route_command.as_ref(), version)
            .await
    }

    async fn switch_to_backup(&self) -> Result<()> {
        self.run_hook("traffic.failover_command", self.config.failover_command.as_ref(), "")
            .await
    }

    async fn update_dns(&self, target: &str) -> Result<()> {
        self.run_hook("traffic.dns_command", self.config.dns_command.as_ref(), target)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_route_hook_receives_version() {
        let temp = TempDir::new().unwrap();
        let marker = temp.path().join("routed");
        let adapter = CommandTrafficAdapter::new(TrafficConfig {
            route_command: Some(format!("echo {{version}} > {}", marker.display())),
            ..Default::default()
        });

        adapter.route_to_version("v1.4.2").await.unwrap();
        assert_eq!(std::fs::read_to_string(marker).unwrap().trim(), "v1.4.2");
    }

    #[tokio::test]
    async fn test_missing_hook_is_noop() {
        let adapter = CommandTrafficAdapter::new(TrafficConfig::default());
        adapter.switch_to_backup().await.unwrap();
        adapter.update_dns("standby").await.unwrap();
    }

    #[tokio::test]
    async fn test_failing_hook_is_error() {
        let adapter = CommandTrafficAdapter::new(TrafficConfig {
            dns_command: Some("exit 1".to_string()),
            ..Default::default()
        });
        assert!(adapter.update_dns("x").await.is_err());
    }
}
