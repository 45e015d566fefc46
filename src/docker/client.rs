//! Centralized Docker CLI client.
//!
//! All `docker` invocations outside of compose go through `DockerClient`, which
//! provides consistent timeout handling and error mapping to [`DockerError`].

use super::DockerError;
use crate::engine::{ContainerEngine, ContainerInfo, HealthState, RunState};
use crate::error::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Output;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Centralized client for Docker CLI operations.
#[derive(Debug, Clone)]
pub struct DockerClient {
    timeout: Duration,
}

impl DockerClient {
    pub fn new() -> Self {
        DockerClient {
            timeout: DEFAULT_TIMEOUT,
        }
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    /// Run a docker command with a timeout, returning raw Output.
    async fn run(&self, args: &[&str]) -> std::result::Result<Output, DockerError> {
        let result = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new("docker").args(args).output(),
        )
        .await;

        let cmd_str = format!("docker {}", args.join(" "));

        match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(DockerError::spawn(cmd_str, e)),
            Err(_) => Err(DockerError::timed_out(cmd_str, self.timeout)),
        }
    }

    /// Run a docker command with a timeout, returning Output only if exit 0.
    async fn run_success(&self, args: &[&str]) -> std::result::Result<Output, DockerError> {
        let output = self.run(args).await?;
        if output.status.success() {
            Ok(output)
        } else {
            let object = args.last().copied().unwrap_or_default();
            Err(DockerError::from_output(
                format!("docker {}", args.join(" ")),
                object,
                &output,
            ))
        }
    }

    /// Check if the Docker daemon is responsive.
    pub async fn daemon_healthy(&self) -> bool {
        match self.run(&["info", "--format", "{{.ServerVersion}}"]).await {
            Ok(o) => o.status.success(),
            Err(_) => false,
        }
    }
}

impl Default for DockerClient {
    fn default() -> Self {
        Self::new()
    }
}

/// The subset of `docker inspect` output the engine reads.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectDoc {
    id: String,
    image: String,
    #[serde(default)]
    config: Option<InspectConfig>,
    state: InspectState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    #[serde(default)]
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    status: String,
    #[serde(default)]
    health: Option<InspectHealth>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectHealth {
    status: String,
}

pub(crate) fn parse_inspect(json: &str) -> std::result::Result<ContainerInfo, String> {
    let docs: Vec<InspectDoc> = serde_json::from_str(json).map_err(|e| e.to_string())?;
    let doc = docs
        .into_iter()
        .next()
        .ok_or_else(|| "empty inspect result".to_string())?;
    Ok(ContainerInfo {
        container_id: doc.id,
        image_id: doc.image,
        configured_image_ref: doc
            .config
            .and_then(|c| c.image)
            .filter(|s| !s.is_empty()),
        state: RunState::parse(&doc.state.status),
        probe: doc
            .state
            .health
            .map(|h| HealthState::from_probe(&h.status))
            .unwrap_or(HealthState::None),
    })
}

#[async_trait]
impl ContainerEngine for DockerClient {
    async fn inspect(&self, container_id: &str) -> Result<ContainerInfo> {
        let output = self
            .run_success(&["inspect", "--type", "container", container_id])
            .await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_inspect(&stdout).map_err(|detail| {
            DockerError::Unparseable {
                command: format!("docker inspect {}", container_id),
                detail,
            }
            .into()
        })
    }

    async fn tag(&self, image_id: &str, reference: &str) -> Result<()> {
        self.run_success(&["tag", image_id, reference]).await?;
        Ok(())
    }
}
