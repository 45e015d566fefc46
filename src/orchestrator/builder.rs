use super::Orchestrator;
use crate::config::Settings;
use crate::engine::{ComposeEngine, ContainerEngine};
use crate::error::{Error, Result};
use crate::health::DEFAULT_POLL_INTERVAL;
use crate::hooks::Identity;
use crate::lock::LockManager;
use crate::notify::{NoopNotifier, Notifier};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Builder for an [`Orchestrator`].
///
/// The compose engine, container engine and lock directory are required.
/// Everything else has a default: no notifications, default settings, no
/// per-project log files, the current process identity for hooks and a
/// five-second health poll.
///
/// ```no_run
/// use stackward::engine::ComposeCli;
/// use stackward::docker::DockerClient;
/// use stackward::Orchestrator;
/// use std::sync::Arc;
///
/// # fn example() -> stackward::Result<()> {
/// let orchestrator = Orchestrator::builder()
///     .compose(Arc::new(ComposeCli::new()))
///     .containers(Arc::new(DockerClient::new()))
///     .lock_dir("/var/lib/stackward/locks")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct OrchestratorBuilder {
    compose: Option<Arc<dyn ComposeEngine>>,
    containers: Option<Arc<dyn ContainerEngine>>,
    notifier: Option<Arc<dyn Notifier>>,
    settings: Settings,
    lock_dir: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    identity: Option<Identity>,
    poll_interval: Duration,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            compose: None,
            containers: None,
            notifier: None,
            settings: Settings::default(),
            lock_dir: None,
            log_dir: None,
            identity: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn compose(mut self, compose: Arc<dyn ComposeEngine>) -> Self {
        self.compose = Some(compose);
        self
    }

    pub fn containers(mut self, containers: Arc<dyn ContainerEngine>) -> Self {
        self.containers = Some(containers);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn lock_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.lock_dir = Some(dir.into());
        self
    }

    /// Directory for `<name>.log` files. Without it, project events only go
    /// to tracing.
    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Identity used for the hook ownership check.
    pub fn identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        let compose = self
            .compose
            .ok_or_else(|| Error::Config("compose engine is required".to_string()))?;
        let containers = self
            .containers
            .ok_or_else(|| Error::Config("container engine is required".to_string()))?;
        let lock_dir = self
            .lock_dir
            .ok_or_else(|| Error::Config("lock directory is required".to_string()))?;

        Ok(Orchestrator {
            compose,
            containers,
            notifier: self.notifier.unwrap_or_else(|| Arc::new(NoopNotifier)),
            settings: self.settings,
            locks: LockManager::new(lock_dir),
            log_dir: self.log_dir,
            identity: self.identity.unwrap_or_else(Identity::current),
            poll_interval: self.poll_interval,
        })
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_engines_and_lock_dir() {
        let result = OrchestratorBuilder::new().lock_dir("/tmp/locks").build();
        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("compose engine")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("builder accepted missing engines"),
        }
    }
}
