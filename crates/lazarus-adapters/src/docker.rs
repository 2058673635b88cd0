//! Docker adapter
//!
//! With `containers.compose_file` set, services are driven through
//! `docker compose`. Otherwise plain `docker` commands act on the containers of
//! `containers.project` (by compose project label), or on every container.

use crate::traits::{ContainerAdapter, ServiceHealth, StopMode};
use crate::utils::{run_checked, run_command_async};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lazarus_core::types::ContainerConfig;
use std::collections::HashMap;
use tokio::process::Command;
use tracing::{debug, info};

/// Environment variable carrying the target image tag into compose files
pub const IMAGE_TAG_ENV: &str = "LAZARUS_IMAGE_TAG";

/// Container adapter for Docker / Docker Compose
#[derive(Debug, Clone)]
pub struct DockerAdapter {
    config: ContainerConfig,
}

impl DockerAdapter {
    pub fn new(config: ContainerConfig) -> Self {
        Self { config }
    }

    fn runtime(&self) -> &str {
        &self.config.runtime
    }

    /// `compose -f <file> [-p <project>] <args>`
    fn compose_args(&self, args: &[&str]) -> Option<Vec<String>> {
        let file = self.config.compose_file.as_ref()?;
        let mut full = vec!["compose".to_string(), "-f".to_string(), file.to_string()];
        if let Some(project) = &self.config.project {
            full.push("-p".to_string());
            full.push(project.clone());
        }
        full.extend(args.iter().map(|s| s.to_string()));
        Some(full)
    }

    /// `ps` filter restricting plain docker to the configured project
    fn project_filter(&self) -> Vec<String> {
        match &self.config.project {
            Some(project) => vec![
                "--filter".to_string(),
                format!("label=com.docker.compose.project={}", project),
            ],
            None => Vec::new(),
        }
    }

    async fn run(&self, args: &[String]) -> Result<String> {
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        run_checked(self.runtime(), &refs).await
    }

    async fn plain_names(&self, extra: &[&str]) -> Result<Vec<String>> {
        let mut args = vec!["ps".to_string()];
        args.extend(extra.iter().map(|s| s.to_string()));
        args.extend(self.project_filter());
        args.extend(["--format".to_string(), "{{.Names}}".to_string()]);
        Ok(lines(&self.run(&args).await?))
    }

    /// Run `<runtime> <verb> <names..>` unless there is nothing to act on
    async fn act_on(&self, verb: &str, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        let mut args = vec![verb.to_string()];
        args.extend(names.iter().cloned());
        self.run(&args).await.map(|_| ())
    }
}

#[async_trait]
impl ContainerAdapter for DockerAdapter {
    async fn ping(&self) -> Result<()> {
        let version = run_checked(self.runtime(), &["info", "--format", "{{.ServerVersion}}"])
            .await
            .context("Container runtime is not reachable")?;
        debug!("Container runtime server version {}", version);
        Ok(())
    }

    async fn list_services(&self) -> Result<Vec<String>> {
        match self.compose_args(&["ps", "--services", "--filter", "status=running"]) {
            Some(args) => Ok(lines(&self.run(&args).await?)),
            None => self.plain_names(&[]).await,
        }
    }

    async fn stop_services(&self, mode: StopMode) -> Result<Vec<String>> {
        let running = self.list_services().await?;
        let verb = match mode {
            StopMode::Graceful => "stop",
            StopMode::Immediate => "kill",
        };
        info!("Stopping {} services ({})", running.len(), mode);

        match self.compose_args(&[verb]) {
            Some(args) => {
                self.run(&args).await?;
            }
            None => self.act_on(verb, &running).await?,
        }
        Ok(running)
    }

    async fn start_services(&self) -> Result<Vec<String>> {
        match self.compose_args(&["up", "-d"]) {
            Some(args) => {
                self.run(&args).await?;
                self.list_services().await
            }
            None => {
                let stopped = self.plain_names(&["-a", "--filter", "status=exited"]).await?;
                self.act_on("start", &stopped).await?;
                Ok(stopped)
            }
        }
    }

    async fn restart_service(&self, name: &str) -> Result<()> {
        match self.compose_args(&["restart", name]) {
            Some(args) => self.run(&args).await.map(|_| ()),
            None => self.act_on("restart", &[name.to_string()]).await,
        }
    }

    async fn update_images(&self, version: &str) -> Result<Vec<String>> {
        if let Some(args) = self.compose_args(&["pull"]) {
            let output = Command::new(self.runtime())
                .args(&args)
                .env(IMAGE_TAG_ENV, version)
                .output()
                .await
                .with_context(|| format!("Failed to run {}", self.runtime()))?;
            if !output.status.success() {
                return Err(anyhow!(
                    "compose pull for {} failed: {}",
                    version,
                    String::from_utf8_lossy(&output.stderr).trim()
                ));
            }
            return Ok(vec![format!("{}={}", IMAGE_TAG_ENV, version)]);
        }

        match &self.config.image {
            Some(image) => {
                let reference = format!("{}:{}", image, version);
                run_checked(self.runtime(), &["pull", &reference]).await?;
                Ok(vec![reference])
            }
            None => {
                debug!("No image repository configured; nothing to update");
                Ok(Vec::new())
            }
        }
    }

    async fn service_health(&self) -> Result<Vec<ServiceHealth>> {
        let args = match self.compose_args(&["ps", "-a", "--format", "{{.Service}}\t{{.Status}}"]) {
            Some(args) => args,
            None => {
                let mut args = vec!["ps".to_string(), "-a".to_string()];
                args.extend(self.project_filter());
                args.extend(["--format".to_string(), "{{.Names}}\t{{.Status}}".to_string()]);
                args
            }
        };
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = run_command_async(self.runtime(), &refs).await?;
        if !output.status.success() {
            return Err(anyhow!(
                "Failed to query service status: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(parse_status_table(&String::from_utf8_lossy(&output.stdout)))
    }
}

fn lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

/// Parse `name<TAB>status` rows. A service is healthy when it is up and not
/// flagged unhealthy by its healthcheck. Duplicate names keep the worst state.
pub fn parse_status_table(output: &str) -> Vec<ServiceHealth> {
    let mut by_name: HashMap<String, ServiceHealth> = HashMap::new();
    let mut order = Vec::new();

    for line in output.lines() {
        let Some((name, status)) = line.split_once('\t') else {
            continue;
        };
        let name = name.trim().to_string();
        let status = status.trim().to_string();
        let healthy = status.starts_with("Up") && !status.contains("(unhealthy)");

        match by_name.get_mut(&name) {
            Some(existing) => {
                if !healthy {
                    existing.healthy = false;
                    existing.status = status;
                }
            }
            None => {
                order.push(name.clone());
                by_name.insert(name.clone(), ServiceHealth { name, healthy, status });
            }
        }
    }

    order
        .into_iter()
        .filter_map(|name| by_name.remove(&name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    #[test]
    fn test_parse_status_table() {
        let out = "api\tUp 3 hours (healthy)\nworker\tUp 2 minutes (unhealthy)\ndb\tExited (1) 5 seconds ago\n";
        let health = parse_status_table(out);
        assert_eq!(health.len(), 3);
        assert!(health[0].healthy);
        assert!(!health[1].healthy);
        assert!(!health[2].healthy);
        assert_eq!(health[2].name, "db");
    }

    #[test]
    fn test_replicas_keep_worst_state() {
        let out = "api\tUp 1 hour\napi\tRestarting (1) 2 seconds ago\n";
        let health = parse_status_table(out);
        assert_eq!(health.len(), 1);
        assert!(!health[0].healthy);
    }

    #[test]
    fn test_compose_args_include_project() {
        let adapter = DockerAdapter::new(ContainerConfig {
            compose_file: Some(Utf8PathBuf::from("/srv/app/compose.yaml")),
            project: Some("shop".to_string()),
            ..Default::default()
        });
        let args = adapter.compose_args(&["stop"]).unwrap();
        assert_eq!(
            args,
            vec!["compose", "-f", "/srv/app/compose.yaml", "-p", "shop", "stop"]
        );
    }

    #[test]
    fn test_plain_mode_filters_by_project_label() {
        let adapter = DockerAdapter::new(ContainerConfig {
            project: Some("shop".to_string()),
            ..Default::default()
        });
        assert!(adapter.compose_args(&["ps"]).is_none());
        assert_eq!(
            adapter.project_filter(),
            vec!["--filter", "label=com.docker.compose.project=shop"]
        );
    }
}
