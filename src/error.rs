// Allow unused_assignments at module level because thiserror's generated code
// for struct variants triggers false positive warnings - the fields ARE used
// in the Display impl but rustc's lint pass doesn't see this.
#![allow(unused_assignments)]

use crate::docker::DockerError;
use miette::Diagnostic;
use std::io;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(stackward::config::error),
        help("Inspect the effective configuration with `stackward config`")
    )]
    Config(String),

    #[error("Registration failed: {0}")]
    #[diagnostic(
        code(stackward::registry::registration),
        help("The directory must exist and contain a compose manifest (compose.yaml, docker-compose.yml, ...)")
    )]
    Registration(String),

    #[error("Invalid schedule: {0}")]
    #[diagnostic(
        code(stackward::schedule::invalid),
        help("Use an hour interval (1-23), a time such as 04:30 or 2:30pm with optional days, or a 5-field cron expression")
    )]
    Schedule(String),

    #[error("Project not found: {0}")]
    #[diagnostic(
        code(stackward::registry::not_found),
        help("List registered projects with `stackward list`")
    )]
    ProjectNotFound(String),

    #[error("Project name '{name}' is ambiguous, it matches: {}", .paths.join(", "))]
    #[diagnostic(
        code(stackward::registry::ambiguous),
        help("Refer to the project by its full path instead")
    )]
    AmbiguousProject { name: String, paths: Vec<String> },

    #[error("An update is already running for '{key}'")]
    #[diagnostic(
        code(stackward::lock::busy),
        help("Wait for the running update to finish, or inspect holders with `stackward locks`")
    )]
    LockBusy { key: String },

    #[error("Hook '{hook}' exited with code {}", .exit_code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()))]
    #[diagnostic(code(stackward::hook::failed))]
    Hook {
        hook: String,
        exit_code: Option<i32>,
    },

    #[error("Image pull failed: {0}")]
    #[diagnostic(code(stackward::compose::pull))]
    Pull(String),

    #[error("Container recreation failed: {0}")]
    #[diagnostic(code(stackward::compose::recreate))]
    Recreate(String),

    #[error("Services did not become healthy within {timeout_secs} seconds")]
    #[diagnostic(
        code(stackward::health::timeout),
        help("Increase HEALTH_TIMEOUT with `stackward config HEALTH_TIMEOUT <seconds>`")
    )]
    HealthTimeout { timeout_secs: u64 },

    #[error("Service '{service}' is {state}")]
    #[diagnostic(
        code(stackward::health::failed),
        help("Check the container logs with `docker compose logs {service}`")
    )]
    HealthFastFail { service: String, state: String },

    #[error("Rollback failed: {0}")]
    #[diagnostic(
        code(stackward::rollback::failed),
        help("The project may be left in a partial state; inspect it with `docker compose ps`")
    )]
    Rollback(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Scheduler error: {0}")]
    #[diagnostic(
        code(stackward::scheduler::error),
        help("Check that `crontab` is installed and usable by this user")
    )]
    Scheduler(String),

    #[error("Docker error: {0}")]
    #[diagnostic(
        code(stackward::docker::error),
        help("Check that Docker is running with `docker ps`")
    )]
    Docker(#[from] DockerError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP error: {0}")]
    #[diagnostic(code(stackward::http::error))]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for both health failure modes. Callers see them as one outcome.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Error::HealthTimeout { .. } | Error::HealthFastFail { .. })
    }

    /// Returns a helpful suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Error::LockBusy { key } => Some(format!(
                "Another stackward process holds the '{}' lock. See `stackward locks` for the holder PID.",
                key
            )),
            Error::ProjectNotFound(_) => {
                Some("Register the project first with: stackward add <dir>".to_string())
            }
            Error::AmbiguousProject { .. } => {
                Some("Two projects normalize to the same name. Use the project path.".to_string())
            }
            Error::Registration(_) => Some(
                "Point `stackward add` at the directory that holds the compose manifest."
                    .to_string(),
            ),
            Error::Schedule(_) => Some(
                "Examples: `--every 6`, `--at 04:30 --days mon,thu`, `--cron \"0 3 * * *\"`"
                    .to_string(),
            ),
            Error::HealthTimeout { .. } => Some(
                "Services may need longer to start. Raise HEALTH_TIMEOUT in `stackward config`."
                    .to_string(),
            ),
            Error::Docker(_) | Error::Pull(_) | Error::Recreate(_) => {
                Some("Check that Docker is running: docker ps".to_string())
            }
            Error::Scheduler(_) => Some("Check that cron is installed: crontab -l".to_string()),
            Error::Config(_) => Some("Review settings with: stackward config".to_string()),
            _ => None,
        }
    }

    /// Formats the error with its suggestion (if any) for user-friendly display.
    pub fn with_suggestion(&self) -> String {
        match self.suggestion() {
            Some(suggestion) => format!("{}\n\nHint: {}", self, suggestion),
            None => self.to_string(),
        }
    }
}
