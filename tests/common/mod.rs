//! Scripted engine and recording notifier shared by the integration tests.
//!
//! Every side effect is appended to one [`CallLog`] so tests can assert the
//! total order of operations across the compose engine, the container engine
//! and the notifier.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use stackward::config::Settings;
use stackward::engine::{
    ComposeEngine, ContainerEngine, ContainerInfo, HealthState, RunState, ServiceContainer,
    UpOptions,
};
use stackward::hooks::Identity;
use stackward::lock::LockManager;
use stackward::notify::{Notifier, Outcome};
use stackward::registry::ProjectRecord;
use stackward::schedule::Schedule;
use stackward::{Error, Orchestrator, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.0.lock().iter().any(|e| e == entry)
    }

    /// Index of the first entry starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e.starts_with(prefix))
    }

    /// Index of the last entry starting with `prefix`.
    pub fn last_position(&self, prefix: &str) -> Option<usize> {
        self.0.lock().iter().rposition(|e| e.starts_with(prefix))
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|e| *e == entry).count()
    }
}

struct MockService {
    name: String,
    container_id: String,
    image_ref: Option<String>,
    image_id: String,
    running: bool,
    /// Health samples returned after the first `up`, consumed front to back.
    /// The last one repeats.
    script: VecDeque<HealthState>,
}

impl MockService {
    /// The next health sample after a recreate says the container stopped.
    fn crashed(&self, ups: usize) -> bool {
        ups > 0 && matches!(self.script.front(), Some(HealthState::Exited | HealthState::Dead))
    }
}

#[derive(Default)]
struct MockState {
    services: Vec<MockService>,
    /// Local image store: reference → image id.
    tags: HashMap<String, String>,
    /// Image ids that `pull` makes current, per reference.
    pull_updates: HashMap<String, String>,
    pull_error: Option<String>,
    /// Results for successive `up` calls; empty means success.
    up_errors: VecDeque<Option<String>>,
    tag_failures: HashSet<String>,
    ups: usize,
}

/// In-memory compose project implementing both engine traits.
pub struct MockEngine {
    state: Mutex<MockState>,
    log: CallLog,
}

impl MockEngine {
    pub fn new(log: CallLog) -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            log,
        }
    }

    /// Add a running service created from `image_id`, tagged as `image_ref`.
    pub fn service(self, name: &str, image_ref: Option<&str>, image_id: &str) -> Self {
        {
            let mut state = self.state.lock();
            if let Some(reference) = image_ref {
                state.tags.insert(reference.to_string(), image_id.to_string());
            }
            let container_id = format!("{}-1", name);
            state.services.push(MockService {
                name: name.to_string(),
                container_id,
                image_ref: image_ref.map(str::to_string),
                image_id: image_id.to_string(),
                running: true,
                script: VecDeque::from([HealthState::None]),
            });
        }
        self
    }

    /// Declared in the manifest but without a running container.
    pub fn stopped_service(self, name: &str, image_ref: &str) -> Self {
        self.state.lock().services.push(MockService {
            name: name.to_string(),
            container_id: format!("{}-1", name),
            image_ref: Some(image_ref.to_string()),
            image_id: String::new(),
            running: false,
            script: VecDeque::from([HealthState::None]),
        });
        self
    }

    pub fn health_script(self, service: &str, script: &[HealthState]) -> Self {
        {
            let mut state = self.state.lock();
            if let Some(svc) = state.services.iter_mut().find(|s| s.name == service) {
                svc.script = script.iter().copied().collect();
            }
        }
        self
    }

    /// `pull` makes `reference` resolve to `image_id`.
    pub fn pull_brings(self, reference: &str, image_id: &str) -> Self {
        self.state
            .lock()
            .pull_updates
            .insert(reference.to_string(), image_id.to_string());
        self
    }

    pub fn pull_fails(self, message: &str) -> Self {
        self.state.lock().pull_error = Some(message.to_string());
        self
    }

    /// Script successive `up` results; `None` is success.
    pub fn up_results(self, results: &[Option<&str>]) -> Self {
        self.state.lock().up_errors = results.iter().map(|r| r.map(str::to_string)).collect();
        self
    }

    pub fn tag_fails_for(self, reference: &str) -> Self {
        self.state.lock().tag_failures.insert(reference.to_string());
        self
    }

    pub fn image_of(&self, service: &str) -> Option<String> {
        self.state
            .lock()
            .services
            .iter()
            .find(|s| s.name == service)
            .map(|s| s.image_id.clone())
    }

    pub fn tag_target(&self, reference: &str) -> Option<String> {
        self.state.lock().tags.get(reference).cloned()
    }
}

#[async_trait]
impl ComposeEngine for MockEngine {
    async fn services(&self, _dir: &Path) -> Result<Vec<String>> {
        self.log.push("services");
        Ok(self.state.lock().services.iter().map(|s| s.name.clone()).collect())
    }

    async fn pull(&self, _dir: &Path) -> Result<()> {
        self.log.push("pull");
        let mut state = self.state.lock();
        if let Some(message) = &state.pull_error {
            return Err(Error::Pull(message.clone()));
        }
        let updates: Vec<(String, String)> = state.pull_updates.drain().collect();
        state.tags.extend(updates);
        Ok(())
    }

    async fn up(&self, _dir: &Path, options: UpOptions) -> Result<()> {
        self.log.push(if options.force_recreate {
            "up --force-recreate"
        } else {
            "up"
        });
        let mut state = self.state.lock();
        state.ups += 1;
        if let Some(Some(message)) = state.up_errors.pop_front() {
            return Err(Error::Recreate(message));
        }
        let tags = state.tags.clone();
        for svc in state.services.iter_mut() {
            if let Some(id) = svc.image_ref.as_ref().and_then(|r| tags.get(r)) {
                svc.image_id = id.clone();
            }
            svc.running = true;
        }
        Ok(())
    }

    /// Like compose, a container that crashed after `up` is only listed
    /// with `all`.
    async fn ps(&self, _dir: &Path, all: bool) -> Result<Vec<ServiceContainer>> {
        self.log.push(if all { "ps --all" } else { "ps" });
        let state = self.state.lock();
        let ups = state.ups;
        Ok(state
            .services
            .iter()
            .filter(|s| s.running && (all || !s.crashed(ups)))
            .map(|s| ServiceContainer {
                service: s.name.clone(),
                container_id: s.container_id.clone(),
            })
            .collect())
    }

    async fn image_ref(&self, _dir: &Path, service: &str) -> Result<Option<String>> {
        Ok(self
            .state
            .lock()
            .services
            .iter()
            .find(|s| s.name == service)
            .and_then(|s| s.image_ref.clone()))
    }

    async fn prune_images(&self) -> Result<()> {
        self.log.push("prune");
        Ok(())
    }
}

#[async_trait]
impl ContainerEngine for MockEngine {
    async fn inspect(&self, container_id: &str) -> Result<ContainerInfo> {
        let mut state = self.state.lock();
        let ups = state.ups;
        let svc = state
            .services
            .iter_mut()
            .find(|s| s.container_id == container_id)
            .ok_or_else(|| Error::Config(format!("no container {}", container_id)))?;

        let health = if ups == 0 {
            HealthState::None
        } else if svc.script.len() > 1 {
            svc.script.pop_front().unwrap_or(HealthState::None)
        } else {
            svc.script.front().copied().unwrap_or(HealthState::None)
        };
        let (run_state, probe) = match health {
            HealthState::Exited => (RunState::Exited, HealthState::None),
            HealthState::Dead => (RunState::Dead, HealthState::None),
            other => (RunState::Running, other),
        };
        Ok(ContainerInfo {
            container_id: container_id.to_string(),
            image_id: svc.image_id.clone(),
            configured_image_ref: svc.image_ref.clone(),
            state: run_state,
            probe,
        })
    }

    async fn tag(&self, image_id: &str, reference: &str) -> Result<()> {
        self.log.push(format!("tag {} {}", image_id, reference));
        let mut state = self.state.lock();
        if state.tag_failures.contains(reference) {
            return Err(Error::Config(format!("cannot tag {}", reference)));
        }
        state.tags.insert(reference.to_string(), image_id.to_string());
        Ok(())
    }
}

/// Records notifications and whether the project lock was still held.
pub struct RecordingNotifier {
    log: CallLog,
    locks: LockManager,
}

impl RecordingNotifier {
    pub fn new(log: CallLog, lock_dir: &Path) -> Self {
        Self {
            log,
            locks: LockManager::new(lock_dir),
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, outcome: Outcome, message: &str, project: &str) {
        let held = self
            .locks
            .inspect(project)
            .map(|status| status.held)
            .unwrap_or(false);
        self.log.push(format!(
            "notify {} {} held={} {}",
            outcome, project, held, message
        ));
    }
}

/// Write an executable hook script into `dir`.
pub fn write_hook(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub struct Harness {
    pub home: tempfile::TempDir,
    pub project_dir: PathBuf,
    pub log: CallLog,
    pub engine: Arc<MockEngine>,
    pub orchestrator: Orchestrator,
    pub record: ProjectRecord,
}

impl Harness {
    pub fn lock_dir(&self) -> PathBuf {
        self.home.path().join("locks")
    }

    pub fn project_log(&self) -> String {
        std::fs::read_to_string(self.home.path().join("logs").join("web.log")).unwrap_or_default()
    }
}

/// Settings with a short health timeout suited to millisecond polling.
pub fn fast_settings() -> Settings {
    Settings {
        health_timeout: Duration::from_millis(300),
        ..Settings::default()
    }
}

pub fn current_user() -> Identity {
    Identity {
        uid: nix::unistd::geteuid().as_raw(),
        privileged: false,
    }
}

/// Orchestrator for a project named `web` backed by the engine `build`
/// produces from a fresh call log.
pub fn harness(settings: Settings, build: impl FnOnce(MockEngine) -> MockEngine) -> Harness {
    harness_as(current_user(), settings, build)
}

pub fn harness_as(
    identity: Identity,
    settings: Settings,
    build: impl FnOnce(MockEngine) -> MockEngine,
) -> Harness {
    let home = tempfile::tempdir().unwrap();
    let project_dir = home.path().join("web");
    std::fs::create_dir_all(&project_dir).unwrap();
    std::fs::write(project_dir.join("compose.yaml"), "services: {}\n").unwrap();

    let log = CallLog::default();
    let engine = Arc::new(build(MockEngine::new(log.clone())));
    let lock_dir = home.path().join("locks");
    let orchestrator = Orchestrator::builder()
        .compose(engine.clone())
        .containers(engine.clone())
        .notifier(Arc::new(RecordingNotifier::new(log.clone(), &lock_dir)))
        .settings(settings)
        .lock_dir(&lock_dir)
        .log_dir(home.path().join("logs"))
        .identity(identity)
        .poll_interval(Duration::from_millis(10))
        .build()
        .unwrap();

    let record = ProjectRecord::new(&project_dir, "web", Schedule::Interval(6));
    Harness {
        home,
        project_dir,
        log,
        engine,
        orchestrator,
        record,
    }
}
