//! Post-recreate health verification.
//!
//! The monitor polls on a fixed interval. A round is healthy when the project
//! has at least one container and every container, stopped ones included, is
//! either healthy or running without a probe. An exited, dead or unhealthy container ends the wait at
//! once; running out of time ends it with a timeout. Both are "unhealthy" to
//! callers, see [`Error::is_unhealthy`].

use crate::engine::{ComposeEngine, ContainerEngine, HealthState, RunState};
use crate::error::{Error, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// One service's state in a poll round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSample {
    pub service: String,
    pub state: HealthState,
}

/// Verdict of a single poll round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Round {
    Healthy(Vec<HealthSample>),
    /// Keep polling.
    Pending(String),
    Failed(HealthSample),
}

pub struct HealthMonitor {
    compose: Arc<dyn ComposeEngine>,
    containers: Arc<dyn ContainerEngine>,
    interval: Duration,
}

impl HealthMonitor {
    pub fn new(compose: Arc<dyn ComposeEngine>, containers: Arc<dyn ContainerEngine>) -> Self {
        Self {
            compose,
            containers,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Poll until every service in `dir` is healthy or `timeout` elapses.
    pub async fn wait_for_healthy(&self, dir: &Path, timeout: Duration) -> Result<Vec<HealthSample>> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.poll(dir).await {
                Round::Healthy(samples) => return Ok(samples),
                Round::Failed(sample) => {
                    return Err(Error::HealthFastFail {
                        service: sample.service,
                        state: sample.state.to_string(),
                    })
                }
                Round::Pending(reason) => debug!(dir = %dir.display(), "Not healthy yet: {}", reason),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(Error::HealthTimeout {
                    timeout_secs: timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.interval.min(deadline - now)).await;
        }
    }

    /// Sample every container of the project once.
    ///
    /// Containers that already exited are listed too, otherwise a crashed
    /// service would simply drop out of the round. Engine errors make the
    /// round pending rather than failed; a flaky `docker` call should not
    /// trigger a rollback on its own.
    pub async fn poll(&self, dir: &Path) -> Round {
        let containers = match self.compose.ps(dir, true).await {
            Ok(containers) => containers,
            Err(e) => return Round::Pending(format!("listing containers failed: {}", e)),
        };
        if containers.is_empty() {
            return Round::Pending("no containers for the project yet".to_string());
        }

        let mut samples = Vec::with_capacity(containers.len());
        let mut pending = None;
        for container in containers {
            let info = match self.containers.inspect(&container.container_id).await {
                Ok(info) => info,
                Err(e) => {
                    pending.get_or_insert(format!("inspecting {} failed: {}", container.service, e));
                    continue;
                }
            };

            let state = info.health();
            let sample = HealthSample {
                service: container.service,
                state,
            };
            match state {
                HealthState::Exited | HealthState::Dead | HealthState::Unhealthy => {
                    return Round::Failed(sample)
                }
                HealthState::Starting => {
                    pending.get_or_insert(format!("{} is starting", sample.service));
                }
                HealthState::None | HealthState::Healthy if info.state != RunState::Running => {
                    pending.get_or_insert(format!("{} is {:?}", sample.service, info.state));
                }
                HealthState::None | HealthState::Healthy => {}
            }
            samples.push(sample);
        }

        match pending {
            Some(reason) => Round::Pending(reason),
            None => Round::Healthy(samples),
        }
    }
}
