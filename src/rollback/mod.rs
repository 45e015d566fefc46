//! Image snapshots and local-retag rollback.
//!
//! Before an update touches anything, [`RollbackManager::snapshot`] records the
//! image id every running service was created from. If the update fails after
//! containers were recreated, [`RollbackManager::rollback`] points each
//! service's configured `repository:tag` back at the recorded id and
//! force-recreates the project. No registry is contacted.

use crate::engine::{ComposeEngine, ContainerEngine, UpOptions};
use crate::error::{Error, Result};
use crate::project_log::ProjectLog;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    /// Content-addressed image id, e.g. `sha256:...`.
    pub image_id: String,
    /// Reference from the container config, used when compose cannot name one.
    pub image_ref: Option<String>,
}

/// Service name → image in use before the update. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackSnapshot {
    pub images: BTreeMap<String, SnapshotEntry>,
}

impl RollbackSnapshot {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn image_id(&self, service: &str) -> Option<&str> {
        self.images.get(service).map(|e| e.image_id.as_str())
    }
}

/// Per-service result of a rollback whose final recreate succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackSummary {
    /// `(service, reference)` pairs retagged to their snapshot image.
    pub retagged: Vec<(String, String)>,
    /// Services with no resolvable `repository:tag`.
    pub skipped: Vec<String>,
    /// `(service, reason)` pairs whose retag failed.
    pub failed: Vec<(String, String)>,
}

impl RollbackSummary {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty()
    }
}

pub struct RollbackManager {
    compose: Arc<dyn ComposeEngine>,
    containers: Arc<dyn ContainerEngine>,
}

impl RollbackManager {
    pub fn new(compose: Arc<dyn ComposeEngine>, containers: Arc<dyn ContainerEngine>) -> Self {
        Self {
            compose,
            containers,
        }
    }

    /// Record the image of every declared service that has a running container.
    pub async fn snapshot(&self, dir: &Path) -> Result<RollbackSnapshot> {
        let declared: HashSet<String> = self.compose.services(dir).await?.into_iter().collect();
        let running = self.compose.ps(dir, false).await?;

        let mut snapshot = RollbackSnapshot::default();
        for container in running {
            if !declared.contains(&container.service)
                || snapshot.images.contains_key(&container.service)
            {
                continue;
            }
            let info = match self.containers.inspect(&container.container_id).await {
                Ok(info) => info,
                // Removed between ps and inspect: not running, nothing to restore
                Err(Error::Docker(e)) if e.is_not_found() => {
                    debug!(service = %container.service, "Container vanished before inspect");
                    continue;
                }
                Err(e) => return Err(e),
            };
            snapshot.images.insert(
                container.service,
                SnapshotEntry {
                    image_id: info.image_id,
                    image_ref: info.configured_image_ref,
                },
            );
        }
        Ok(snapshot)
    }

    /// Retag every snapshotted service, then force-recreate the project.
    ///
    /// Retag problems are logged per service and do not stop the rollback.
    /// Only a failed final recreate is an error.
    pub async fn rollback(
        &self,
        dir: &Path,
        snapshot: &RollbackSnapshot,
        log: &ProjectLog,
    ) -> Result<RollbackSummary> {
        let mut summary = RollbackSummary::default();

        for (service, entry) in &snapshot.images {
            let reference = match self.compose.image_ref(dir, service).await {
                Ok(Some(reference)) => Some(reference),
                Ok(None) => entry.image_ref.clone(),
                Err(e) => {
                    log.warn(format!(
                        "Could not resolve image reference for {}: {}",
                        service, e
                    ));
                    entry.image_ref.clone()
                }
            };
            // A bare id cannot be re-pointed
            let Some(reference) = reference.filter(|r| !is_image_id(r)) else {
                log.warn(format!(
                    "Skipping {}: no repository:tag to restore {} under",
                    service, entry.image_id
                ));
                summary.skipped.push(service.clone());
                continue;
            };

            match self.containers.tag(&entry.image_id, &reference).await {
                Ok(()) => {
                    log.info(format!(
                        "Retagged {} -> {} for {}",
                        reference, entry.image_id, service
                    ));
                    summary.retagged.push((service.clone(), reference));
                }
                Err(e) => {
                    log.warn(format!("Retag of {} for {} failed: {}", reference, service, e));
                    summary.failed.push((service.clone(), e.to_string()));
                }
            }
        }

        self.compose
            .up(dir, UpOptions::recreate())
            .await
            .map_err(|e| Error::Rollback(format!("recreate from snapshot failed: {}", e)))?;
        Ok(summary)
    }
}

fn is_image_id(reference: &str) -> bool {
    reference.starts_with("sha256:")
}
