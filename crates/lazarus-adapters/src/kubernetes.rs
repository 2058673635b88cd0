//! Kubernetes adapter driving kubectl

use crate::traits::OrchestrationAdapter;
use crate::utils::{run_checked, run_command_async};
use anyhow::{Context, Result};
use async_trait::async_trait;
use lazarus_core::types::KubernetesConfig;
use serde_json::Value;
use tracing::{info, warn};

/// Waiting reasons that mark a pod as failed
const FAILED_WAITING_REASONS: &[&str] = &[
    "CrashLoopBackOff",
    "ImagePullBackOff",
    "ErrImagePull",
    "CreateContainerConfigError",
];

/// Orchestration adapter for Kubernetes
#[derive(Debug, Clone)]
pub struct KubernetesAdapter {
    config: KubernetesConfig,
}

impl KubernetesAdapter {
    pub fn new(config: KubernetesConfig) -> Self {
        Self { config }
    }

    /// Context and namespace flags followed by `args`
    fn kubectl_args(&self, args: &[&str]) -> Vec<String> {
        let mut full = Vec::new();
        if let Some(context) = &self.config.context {
            full.push("--context".to_string());
            full.push(context.clone());
        }
        full.push("-n".to_string());
        full.push(self.config.namespace.clone());
        full.extend(args.iter().map(|s| s.to_string()));
        full
    }

    async fn kubectl(&self, args: &[&str]) -> Result<String> {
        let full = self.kubectl_args(args);
        let refs: Vec<&str> = full.iter().map(String::as_str).collect();
        run_checked("kubectl", &refs).await
    }
}

#[async_trait]
impl OrchestrationAdapter for KubernetesAdapter {
    async fn ping(&self) -> Result<()> {
        self.kubectl(&["get", "serviceaccount", "default", "-o", "name"])
            .await
            .map(|_| ())
            .context("Kubernetes API is not reachable")
    }

    async fn failed_workloads(&self) -> Result<Vec<String>> {
        let json = self.kubectl(&["get", "pods", "-o", "json"]).await?;
        let pods: Value = serde_json::from_str(&json).context("Invalid kubectl pod listing")?;
        Ok(parse_failed_pods(&pods))
    }

    async fn restart_workload(&self, name: &str) -> Result<()> {
        info!("Recreating pod {} in {}", name, self.config.namespace);
        self.kubectl(&["delete", "pod", name, "--wait=false"])
            .await
            .map(|_| ())
    }

    async fn rollout_complete(&self) -> Result<bool> {
        let args = self.kubectl_args(&[
            "wait",
            "--for=condition=Available",
            "deployment",
            "--all",
            "--timeout=120s",
        ]);
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = run_command_async("kubectl", &refs).await?;
        if !output.status.success() {
            warn!("Deployments in {} not available", self.config.namespace);
        }
        Ok(output.status.success())
    }
}

/// Names of pods in phase Failed/Unknown or stuck in a failing wait state
pub fn parse_failed_pods(pods: &Value) -> Vec<String> {
    let Some(items) = pods.get("items").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter(|pod| {
            let phase = pod
                .pointer("/status/phase")
                .and_then(Value::as_str)
                .unwrap_or("Unknown");
            let waiting_failure = pod
                .pointer("/status/containerStatuses")
                .and_then(Value::as_array)
                .map(|statuses| {
                    statuses.iter().any(|s| {
                        s.pointer("/state/waiting/reason")
                            .and_then(Value::as_str)
                            .is_some_and(|r| FAILED_WAITING_REASONS.contains(&r))
                    })
                })
                .unwrap_or(false);
            matches!(phase, "Failed" | "Unknown") || waiting_failure
        })
        .filter_map(|pod| pod.pointer("/metadata/name").and_then(Value::as_str))
        .map(String::from)
        .collect()
}
