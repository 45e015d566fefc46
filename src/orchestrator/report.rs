use crate::error::Error;
use crate::notify::Outcome;
use crate::registry::ProjectRecord;
use std::fmt;
use std::path::PathBuf;

/// States of one update attempt, in the order they can be entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdatePhase {
    Locking,
    PreHook,
    Snapshotting,
    Pulling,
    Recreating,
    HealthChecking,
    PostHook,
    Cleanup,
    RollingBack,
    NotifyAndRelease,
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpdatePhase::Locking => "locking",
            UpdatePhase::PreHook => "pre-hook",
            UpdatePhase::Snapshotting => "snapshotting",
            UpdatePhase::Pulling => "pulling",
            UpdatePhase::Recreating => "recreating",
            UpdatePhase::HealthChecking => "health-checking",
            UpdatePhase::PostHook => "post-hook",
            UpdatePhase::Cleanup => "cleanup",
            UpdatePhase::RollingBack => "rolling-back",
            UpdatePhase::NotifyAndRelease => "notify-and-release",
        };
        f.write_str(s)
    }
}

/// Result of one [`super::Orchestrator::update`] run.
#[derive(Debug)]
pub struct UpdateReport {
    pub project: String,
    pub path: PathBuf,
    pub outcome: Outcome,
    /// Phases entered, in order.
    pub phases: Vec<UpdatePhase>,
    /// The text that was logged and sent to the webhook.
    pub message: String,
    /// The error that ended the happy path.
    pub failure: Option<Error>,
    /// A rollback ran and its final recreate succeeded.
    pub rolled_back: bool,
}

impl UpdateReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn visited(&self, phase: UpdatePhase) -> bool {
        self.phases.contains(&phase)
    }

    /// Phase names joined with `→`.
    pub fn trail(&self) -> String {
        self.phases
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(" → ")
    }
}

/// Progress of an [`super::Orchestrator::update_all`] run.
#[derive(Debug, Clone, Copy)]
pub enum BatchEvent<'a> {
    /// Disabled for scheduled updates.
    Skipped(&'a ProjectRecord),
    Starting(&'a ProjectRecord),
    Finished(&'a UpdateReport),
}
