//! The update state machine.
//!
//! ```text
//! Locking → PreHook → Snapshotting → Pulling → Recreating → HealthChecking
//!     ├─ healthy   → PostHook → Cleanup ─┐
//!     └─ unhealthy → RollingBack ────────┴→ NotifyAndRelease
//! ```
//!
//! A failed pull goes straight to `NotifyAndRelease`: nothing has changed
//! yet, so there is nothing to roll back. A failed recreate or health check
//! always rolls back. The notification is sent while the project lock is
//! still held and the lock is released right after.

mod builder;
mod report;

pub use builder::OrchestratorBuilder;
pub use report::{BatchEvent, UpdatePhase, UpdateReport};

use crate::config::{Paths, PreHookPolicy, Settings};
use crate::docker::DockerClient;
use crate::engine::{ComposeCli, ComposeEngine, ContainerEngine, UpOptions};
use crate::error::{Error, Result};
use crate::health::HealthMonitor;
use crate::hooks::{HookKind, HookOutcome, HookRunner, Identity};
use crate::lock::{LockHandle, LockManager};
use crate::notify::{self, Notifier, Outcome};
use crate::project_log::ProjectLog;
use crate::registry::ProjectRecord;
use crate::rollback::{RollbackManager, RollbackSnapshot};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct Orchestrator {
    compose: Arc<dyn ComposeEngine>,
    containers: Arc<dyn ContainerEngine>,
    notifier: Arc<dyn Notifier>,
    settings: Settings,
    locks: LockManager,
    log_dir: Option<PathBuf>,
    identity: Identity,
    poll_interval: Duration,
}

/// Bookkeeping for one attempt.
struct Attempt<'a> {
    record: &'a ProjectRecord,
    log: ProjectLog,
    phases: Vec<UpdatePhase>,
}

impl Attempt<'_> {
    fn enter(&mut self, phase: UpdatePhase) {
        debug!(project = %self.record.name, phase = ?phase, "Entering phase");
        self.phases.push(phase);
    }

    fn dir(&self) -> &Path {
        &self.record.path
    }
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Orchestrator wired to the real `docker` CLI and the host layout.
    pub fn for_host(paths: &Paths, settings: Settings) -> Result<Self> {
        let notifier = notify::from_settings(&settings)?;
        Self::builder()
            .compose(Arc::new(ComposeCli::new()))
            .containers(Arc::new(DockerClient::new()))
            .notifier(notifier)
            .settings(settings)
            .lock_dir(paths.lock_dir())
            .log_dir(paths.log_dir())
            .build()
    }

    pub fn project_log(&self, name: &str) -> ProjectLog {
        match &self.log_dir {
            Some(dir) => ProjectLog::new(name, dir.join(format!("{}.log", name))),
            None => ProjectLog::disabled(name),
        }
    }

    /// Run one complete update attempt for `record`.
    ///
    /// Never returns an error: every outcome, including a busy lock, is
    /// described by the report.
    pub async fn update(&self, record: &ProjectRecord) -> UpdateReport {
        let mut attempt = Attempt {
            record,
            log: self.project_log(&record.name),
            phases: Vec::new(),
        };

        attempt.enter(UpdatePhase::Locking);
        let lock = match self.locks.acquire(&record.name) {
            Ok(lock) => lock,
            Err(e) => {
                let message = format!("Update of {} not started: {}", record.name, e);
                attempt.log.warn(&message);
                self.notifier
                    .notify(Outcome::Failure, &message, &record.name)
                    .await;
                return report(attempt, Outcome::Failure, message, Some(e), false);
            }
        };
        attempt.log.info(format!("Update started for {}", record.path.display()));

        let result = self.run_phases(&mut attempt).await;
        self.finish(attempt, lock, result).await
    }

    /// Update each enabled record in turn. Disabled records are skipped.
    ///
    /// `on_event` sees every skip, start and finished report as it happens.
    pub async fn update_all<F>(&self, records: &[ProjectRecord], mut on_event: F) -> Vec<UpdateReport>
    where
        F: FnMut(BatchEvent<'_>) + Send,
    {
        let mut reports = Vec::new();
        for record in records {
            if !record.status.is_enabled() {
                debug!(project = %record.name, "Skipping disabled project");
                on_event(BatchEvent::Skipped(record));
                continue;
            }
            on_event(BatchEvent::Starting(record));
            let report = self.update(record).await;
            on_event(BatchEvent::Finished(&report));
            reports.push(report);
        }
        reports
    }

    /// Everything between acquiring the lock and notifying.
    async fn run_phases(&self, attempt: &mut Attempt<'_>) -> std::result::Result<String, Failure> {
        let hooks = HookRunner::new(self.identity);
        let name = attempt.record.name.clone();

        attempt.enter(UpdatePhase::PreHook);
        match hooks
            .run(&name, attempt.dir(), HookKind::PreUpdate, &attempt.log)
            .await
        {
            Ok(HookOutcome::SkippedOwnership { .. }) | Ok(HookOutcome::NotExecutable) => {
                attempt.log.warn("Pre-update hook skipped, continuing");
            }
            Ok(_) => {}
            Err(e) => match self.settings.pre_hook_policy {
                PreHookPolicy::Abort => {
                    return Err(Failure::unchanged(e));
                }
                PreHookPolicy::Continue => {
                    attempt
                        .log
                        .warn(format!("{}; continuing as PRE_HOOK_POLICY=continue", e));
                }
            },
        }

        let rollback = RollbackManager::new(self.compose.clone(), self.containers.clone());
        attempt.enter(UpdatePhase::Snapshotting);
        let snapshot = rollback
            .snapshot(attempt.dir())
            .await
            .map_err(Failure::unchanged)?;
        attempt.log.info(format!(
            "Recorded images of {} running service(s)",
            snapshot.len()
        ));

        attempt.enter(UpdatePhase::Pulling);
        self.compose
            .pull(attempt.dir())
            .await
            .map_err(Failure::unchanged)?;
        attempt.log.info("Images pulled");

        attempt.enter(UpdatePhase::Recreating);
        if let Err(e) = self.compose.up(attempt.dir(), UpOptions::recreate()).await {
            return Err(Failure::mutated(e, snapshot));
        }
        attempt.log.info("Containers recreated");

        attempt.enter(UpdatePhase::HealthChecking);
        let monitor = HealthMonitor::new(self.compose.clone(), self.containers.clone())
            .with_interval(self.poll_interval);
        let samples = match monitor
            .wait_for_healthy(attempt.dir(), self.settings.health_timeout)
            .await
        {
            Ok(samples) => samples,
            Err(e) => {
                let kind = match e {
                    Error::HealthTimeout { .. } => "timed out",
                    _ => "failed fast",
                };
                attempt.log.error(format!("Health check {}: {}", kind, e));
                return Err(Failure::mutated(e, snapshot));
            }
        };
        attempt
            .log
            .info(format!("{} service(s) healthy", samples.len()));

        attempt.enter(UpdatePhase::PostHook);
        if let Err(e) = hooks
            .run(&name, attempt.dir(), HookKind::PostUpdate, &attempt.log)
            .await
        {
            attempt.log.warn(format!("{}; update still counts as successful", e));
        }

        attempt.enter(UpdatePhase::Cleanup);
        if self.settings.prune_images {
            match self.compose.prune_images().await {
                Ok(()) => attempt.log.info("Pruned unused images"),
                Err(e) => attempt.log.warn(format!("Image prune failed: {}", e)),
            }
        }

        Ok(format!(
            "Updated {}: {} service(s) healthy",
            name,
            samples.len()
        ))
    }

    /// Roll back if needed, notify, release.
    async fn finish(
        &self,
        mut attempt: Attempt<'_>,
        lock: LockHandle,
        result: std::result::Result<String, Failure>,
    ) -> UpdateReport {
        let name = attempt.record.name.clone();
        let (outcome, message, failure, rolled_back) = match result {
            Ok(message) => {
                attempt.log.info(&message);
                (Outcome::Success, message, None, false)
            }
            Err(Failure { error, snapshot }) => {
                let mut message = format!("Update of {} failed: {}", name, error);
                let mut rolled_back = false;

                if let Some(snapshot) = snapshot {
                    attempt.enter(UpdatePhase::RollingBack);
                    attempt.log.warn(format!(
                        "Rolling back {} service(s) to previous images",
                        snapshot.len()
                    ));
                    let rollback =
                        RollbackManager::new(self.compose.clone(), self.containers.clone());
                    match rollback.rollback(attempt.dir(), &snapshot, &attempt.log).await {
                        Ok(summary) if summary.is_complete() => {
                            rolled_back = true;
                            message.push_str("; rolled back to previous images");
                        }
                        Ok(summary) => {
                            rolled_back = true;
                            message.push_str(&format!(
                                "; rolled back with {} service(s) not restored",
                                summary.skipped.len() + summary.failed.len()
                            ));
                        }
                        Err(e) => {
                            message.push_str(&format!("; {}", e));
                        }
                    }
                }
                attempt.log.error(&message);
                (Outcome::Failure, message, Some(error), rolled_back)
            }
        };

        attempt.enter(UpdatePhase::NotifyAndRelease);
        self.notifier.notify(outcome, &message, &name).await;
        lock.release();
        info!(project = %name, %outcome, "Update finished");

        report(attempt, outcome, message, failure, rolled_back)
    }
}

/// Why the happy path ended, and whether containers had been touched.
struct Failure {
    error: Error,
    /// Present once recreate has been attempted.
    snapshot: Option<RollbackSnapshot>,
}

impl Failure {
    fn unchanged(error: Error) -> Self {
        Self {
            error,
            snapshot: None,
        }
    }

    fn mutated(error: Error, snapshot: RollbackSnapshot) -> Self {
        Self {
            error,
            snapshot: Some(snapshot),
        }
    }
}

fn report(
    attempt: Attempt<'_>,
    outcome: Outcome,
    message: String,
    failure: Option<Error>,
    rolled_back: bool,
) -> UpdateReport {
    UpdateReport {
        project: attempt.record.name.clone(),
        path: attempt.record.path.clone(),
        outcome,
        phases: attempt.phases,
        message,
        failure,
        rolled_back,
    }
}
