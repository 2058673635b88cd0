//! Application adapter: git-tagged releases plus an HTTP health check

use crate::traits::ApplicationAdapter;
use crate::utils::{run_checked, run_command_async, run_shell};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lazarus_core::types::ApplicationConfig;
use semver::Version;
use std::time::Duration;
use tracing::{debug, info, warn};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Releases are git tags in `application.code_dir`
#[derive(Debug, Clone)]
pub struct GitApplication {
    config: ApplicationConfig,
    client: reqwest::Client,
}

impl GitApplication {
    pub fn new(config: ApplicationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HEALTH_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { config, client })
    }

    fn git_args<'a>(&'a self, args: &[&'a str]) -> Vec<&'a str> {
        let mut full = vec!["-C", self.config.code_dir.as_str()];
        full.extend_from_slice(args);
        full
    }

    async fn git(&self, args: &[&str]) -> Result<String> {
        run_checked(&self.config.git, &self.git_args(args)).await
    }
}

#[async_trait]
impl ApplicationAdapter for GitApplication {
    async fn list_versions(&self) -> Result<Vec<String>> {
        let tags = self.git(&["tag", "--list"]).await?;
        Ok(sort_versions(tags.lines().map(str::to_string).collect()))
    }

    async fn current_version(&self) -> Result<Option<String>> {
        for args in [
            ["describe", "--tags", "--exact-match"].as_slice(),
            ["describe", "--tags", "--abbrev=0"].as_slice(),
        ] {
            let output = run_command_async(&self.config.git, &self.git_args(args)).await?;
            if output.status.success() {
                let tag = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !tag.is_empty() {
                    return Ok(Some(tag));
                }
            }
        }
        debug!("Could not determine current version from git tags");
        Ok(None)
    }

    async fn checkout(&self, version: &str) -> Result<()> {
        let reference = format!("refs/tags/{}", version);
        self.git(&["checkout", "--force", "--detach", &reference])
            .await
            .with_context(|| format!("Failed to check out {}", version))?;
        info!("Checked out {} in {}", version, self.config.code_dir);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        let Some(url) = &self.config.health_url else {
            debug!("No application.health_url configured; treating application as responsive");
            return Ok(true);
        };

        match self.client.get(url).send().await {
            Ok(response) => {
                let ok = response.status().is_success();
                if !ok {
                    warn!("Health endpoint {} returned {}", url, response.status());
                }
                Ok(ok)
            }
            Err(e) => {
                warn!("Health endpoint {} unreachable: {}", url, e);
                Ok(false)
            }
        }
    }

    async fn run_integration_tests(&self) -> Result<()> {
        let Some(command) = &self.config.integration_test_command else {
            warn!("No application.integration_test_command configured; skipping");
            return Ok(());
        };
        run_shell(command, Some(&self.config.code_dir))
            .await
            .map(|_| ())
            .map_err(|e| anyhow!("Integration tests failed: {}", e))
    }
}

/// Parse a release label, tolerating a leading `v`
pub fn parse_version(label: &str) -> Option<Version> {
    let trimmed = label.trim();
    let bare = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    Version::parse(bare).ok()
}

/// Semver-ordered (oldest first), deduplicated; labels that are not versions are dropped
pub fn sort_versions(labels: Vec<String>) -> Vec<String> {
    let mut parsed: Vec<(Version, String)> = labels
        .into_iter()
        .filter_map(|label| {
            let label = label.trim().to_string();
            parse_version(&label).map(|v| (v, label))
        })
        .collect();
    parsed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    parsed.dedup_by(|a, b| a.0 == b.0);
    parsed.into_iter().map(|(_, label)| label).collect()
}
