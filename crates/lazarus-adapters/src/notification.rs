//! Notification adapter: tracing, optional webhook, emergency flag file

use crate::traits::{Notification, NotificationAdapter, NotificationLevel};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use camino::Utf8PathBuf;
use chrono::Utc;
use lazarus_core::types::MonitoringConfig;
use serde_json::json;
use std::time::Duration;
use tracing::{error, info, warn};

/// Logs every notification and, when configured, POSTs it as JSON to a webhook
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    webhook_url: Option<String>,
    emergency_flag_path: Option<Utf8PathBuf>,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(config: &MonitoringConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            webhook_url: config.webhook_url.clone(),
            emergency_flag_path: config.emergency_flag_path.clone(),
            client,
        })
    }

    async fn post(&self, body: serde_json::Value) -> Result<()> {
        let Some(url) = &self.webhook_url else {
            return Ok(());
        };
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to reach webhook {}", url))?;
        if !response.status().is_success() {
            return Err(anyhow!("Webhook {} returned HTTP {}", url, response.status()));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationAdapter for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        match notification.level {
            NotificationLevel::Info => info!("{}: {}", notification.title, notification.message),
            NotificationLevel::Warning => warn!("{}: {}", notification.title, notification.message),
            NotificationLevel::Critical => {
                error!("{}: {}", notification.title, notification.message)
            }
        }

        self.post(json!({
            "event": "notification",
            "level": notification.level,
            "title": notification.title,
            "message": notification.message,
            "timestamp": Utc::now().to_rfc3339(),
        }))
        .await
    }

    async fn set_emergency_state(&self, active: bool) -> Result<()> {
        if let Some(path) = &self.emergency_flag_path {
            if active {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(path, Utc::now().to_rfc3339())
                    .await
                    .with_context(|| format!("Failed to write emergency flag {}", path))?;
            } else {
                match tokio::fs::remove_file(path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        if active {
            error!("Monitoring switched to EMERGENCY state");
        } else {
            info!("Monitoring emergency state cleared");
        }

        self.post(json!({
            "event": "emergency_state",
            "active": active,
            "timestamp": Utc::now().to_rfc3339(),
        }))
        .await
    }

    async fn record_deployment(&self, version: &str) -> Result<()> {
        info!("Monitoring now tracks deployment {}", version);
        self.post(json!({
            "event": "deployment",
            "version": version,
            "timestamp": Utc::now().to_rfc3339(),
        }))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_emergency_flag_lifecycle() {
        let temp = TempDir::new().unwrap();
        let flag = Utf8PathBuf::from_path_buf(temp.path().join("state/EMERGENCY")).unwrap();
        let notifier = WebhookNotifier::new(&MonitoringConfig {
            webhook_url: None,
            emergency_flag_path: Some(flag.clone()),
        })
        .unwrap();

        notifier.set_emergency_state(true).await.unwrap();
        assert!(flag.exists());
        notifier.set_emergency_state(false).await.unwrap();
        assert!(!flag.exists());
        notifier.set_emergency_state(false).await.unwrap();
    }

    #[tokio::test]
    async fn test_notify_without_webhook() {
        let notifier = WebhookNotifier::new(&MonitoringConfig::default()).unwrap();
        notifier
            .notify(&Notification::new(NotificationLevel::Warning, "t", "m"))
            .await
            .unwrap();
        notifier.record_deployment("v1.0.0").await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_error() {
        let notifier = WebhookNotifier::new(&MonitoringConfig {
            webhook_url: Some("http://127.0.0.1:9/hook".to_string()),
            emergency_flag_path: None,
        })
        .unwrap();
        assert!(notifier.record_deployment("v1").await.is_err());
    }
}
