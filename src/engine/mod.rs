//! Contracts for the external tools the update engine drives.
//!
//! The core never talks to `docker` directly. Everything goes through the two
//! traits below so that the orchestration logic can be exercised against a
//! scripted engine in tests. Production implementations live in
//! [`compose::ComposeCli`] and [`crate::docker::DockerClient`].

pub mod compose;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub use compose::ComposeCli;

/// A container backing one compose service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceContainer {
    pub service: String,
    pub container_id: String,
}

/// Flags for `compose up`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpOptions {
    /// Recreate containers even if their configuration and image are unchanged.
    pub force_recreate: bool,
    pub remove_orphans: bool,
}

impl UpOptions {
    /// Options for both the update and the rollback path: every container is
    /// recreated and orphans are dropped.
    pub fn recreate() -> Self {
        Self {
            force_recreate: true,
            remove_orphans: true,
        }
    }
}

/// Container lifecycle state as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Created,
    Running,
    Restarting,
    Paused,
    Removing,
    Exited,
    Dead,
    Unknown,
}

impl RunState {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" => RunState::Created,
            "running" => RunState::Running,
            "restarting" => RunState::Restarting,
            "paused" => RunState::Paused,
            "removing" => RunState::Removing,
            "exited" => RunState::Exited,
            "dead" => RunState::Dead,
            _ => RunState::Unknown,
        }
    }
}

/// Per-service health sample taken on each poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Running with no health probe configured.
    None,
    Starting,
    Healthy,
    Unhealthy,
    Exited,
    Dead,
}

impl HealthState {
    /// Parse a probe status (`.State.Health.Status`). Empty means no probe.
    pub fn from_probe(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "starting" => HealthState::Starting,
            "healthy" => HealthState::Healthy,
            "unhealthy" => HealthState::Unhealthy,
            _ => HealthState::None,
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthState::None => "running",
            HealthState::Starting => "starting",
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
            HealthState::Exited => "exited",
            HealthState::Dead => "dead",
        };
        f.write_str(s)
    }
}

/// Result of inspecting one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub container_id: String,
    /// Content-addressed id of the image the container was created from.
    pub image_id: String,
    /// Image reference from the container config (e.g. `nginx:1.25`).
    pub configured_image_ref: Option<String>,
    pub state: RunState,
    /// Probe status, `HealthState::None` when the container has no probe.
    pub probe: HealthState,
}

impl ContainerInfo {
    /// Collapse run state and probe status into a single health sample.
    ///
    /// Exited and dead containers report as such regardless of their last
    /// probe result.
    pub fn health(&self) -> HealthState {
        match self.state {
            RunState::Exited => HealthState::Exited,
            RunState::Dead => HealthState::Dead,
            _ => self.probe,
        }
    }
}

/// Compose-level operations, always scoped to one project directory.
#[async_trait]
pub trait ComposeEngine: Send + Sync {
    /// All service names declared by the manifest.
    async fn services(&self, dir: &Path) -> Result<Vec<String>>;

    /// Pull new images for every service. Failure maps to `Error::Pull`.
    async fn pull(&self, dir: &Path) -> Result<()>;

    /// Create or recreate containers. Failure maps to `Error::Recreate`.
    async fn up(&self, dir: &Path, options: UpOptions) -> Result<()>;

    /// Containers of the project. Only running ones unless `all` is set, in
    /// which case exited and dead containers are listed too.
    async fn ps(&self, dir: &Path, all: bool) -> Result<Vec<ServiceContainer>>;

    /// The `repository:tag` a service is configured with, if it has one.
    async fn image_ref(&self, dir: &Path, service: &str) -> Result<Option<String>>;

    /// Remove dangling images.
    async fn prune_images(&self) -> Result<()>;
}

/// Container-level operations.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    async fn inspect(&self, container_id: &str) -> Result<ContainerInfo>;

    /// Point `reference` at `image_id` locally.
    async fn tag(&self, image_id: &str, reference: &str) -> Result<()>;
}
