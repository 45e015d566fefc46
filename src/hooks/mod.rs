//! Optional per-project hook scripts.
//!
//! A project may ship `pre-update.sh` and `post-update.sh` next to its compose
//! manifest. Missing hooks are a silent no-op. Hooks that are present but not
//! executable, or that are owned by someone else while we run privileged, are
//! skipped with a warning and never counted as failures. Only a hook that runs
//! and exits non-zero produces [`Error::Hook`].

use crate::error::{Error, Result};
use crate::project_log::ProjectLog;
use std::fmt;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Environment passed to every hook.
pub const PROJECT_ENV: &str = "STACKWARD_PROJECT";
pub const PROJECT_DIR_ENV: &str = "STACKWARD_PROJECT_DIR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    PreUpdate,
    PostUpdate,
}

impl HookKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            HookKind::PreUpdate => "pre-update.sh",
            HookKind::PostUpdate => "post-update.sh",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// What happened to a hook that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    Missing,
    NotExecutable,
    /// Running privileged and the file belongs to another user.
    SkippedOwnership { owner: u32, expected: u32 },
    Succeeded,
}

/// Who the hooks would run as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub uid: u32,
    pub privileged: bool,
}

impl Identity {
    pub fn current() -> Self {
        let euid = nix::unistd::geteuid();
        Self {
            uid: euid.as_raw(),
            privileged: euid.is_root(),
        }
    }
}

pub struct HookRunner {
    identity: Identity,
}

impl HookRunner {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }

    pub fn hook_path(project_dir: &Path, kind: HookKind) -> PathBuf {
        project_dir.join(kind.file_name())
    }

    /// Run `kind` for the project in `project_dir`, blocking until it exits.
    ///
    /// Hook stdout and stderr are appended to `log`.
    pub async fn run(
        &self,
        project: &str,
        project_dir: &Path,
        kind: HookKind,
        log: &ProjectLog,
    ) -> Result<HookOutcome> {
        let path = Self::hook_path(project_dir, kind);
        let metadata = match std::fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => {
                log.warn(format!("{} is not a regular file, skipping", kind));
                return Ok(HookOutcome::NotExecutable);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HookOutcome::Missing),
            Err(e) => return Err(e.into()),
        };

        if metadata.permissions().mode() & 0o111 == 0 {
            log.warn(format!(
                "{} exists but is not executable, skipping (chmod +x {})",
                kind,
                path.display()
            ));
            return Ok(HookOutcome::NotExecutable);
        }

        if self.identity.privileged && metadata.uid() != self.identity.uid {
            log.warn(format!(
                "{} is owned by uid {} but would run as uid {}, refusing to run it",
                kind,
                metadata.uid(),
                self.identity.uid
            ));
            return Ok(HookOutcome::SkippedOwnership {
                owner: metadata.uid(),
                expected: self.identity.uid,
            });
        }

        log.info(format!("Running {}", kind));
        let output = Command::new(&path)
            .current_dir(project_dir)
            .env(PROJECT_ENV, project)
            .env(PROJECT_DIR_ENV, project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                log.error(format!("Failed to execute {}: {}", kind, e));
                Error::Hook {
                    hook: kind.to_string(),
                    exit_code: None,
                }
            })?;

        log.output(kind.file_name(), &String::from_utf8_lossy(&output.stdout));
        log.output(kind.file_name(), &String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(Error::Hook {
                hook: kind.to_string(),
                exit_code: output.status.code(),
            });
        }
        log.info(format!("{} completed", kind));
        Ok(HookOutcome::Succeeded)
    }
}
