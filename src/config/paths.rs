use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the state directory.
pub const HOME_ENV: &str = "STACKWARD_HOME";

/// On-disk layout of everything stackward persists on a host.
///
/// ```text
/// <root>/projects.conf     registry
/// <root>/config.env        global settings
/// <root>/locks/<key>.lock  advisory locks
/// <root>/logs/<name>.log   per-project log streams
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Explicit root, else `$STACKWARD_HOME`, else `~/.stackward`.
    ///
    /// A relative root is anchored at the current directory: the root ends up
    /// in crontab lines, and cron runs them from `$HOME`.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        if let Some(root) = explicit {
            return Ok(Self::new(absolute(root)?));
        }
        if let Ok(root) = std::env::var(HOME_ENV) {
            if !root.trim().is_empty() {
                return Ok(Self::new(absolute(PathBuf::from(root))?));
            }
        }
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;
        Ok(Self::new(home.join(".stackward")))
    }

    /// Create the state directories if they are missing.
    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(self.lock_dir()).map_err(|e| {
            Error::Config(format!(
                "Failed to create {}: {}",
                self.lock_dir().display(),
                e
            ))
        })?;
        fs::create_dir_all(self.log_dir()).map_err(|e| {
            Error::Config(format!(
                "Failed to create {}: {}",
                self.log_dir().display(),
                e
            ))
        })?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn registry_file(&self) -> PathBuf {
        self.root.join("projects.conf")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.env")
    }

    pub fn lock_dir(&self) -> PathBuf {
        self.root.join("locks")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn project_log(&self, name: &str) -> PathBuf {
        self.log_dir().join(format!("{}.log", name))
    }

    /// Where scheduled invocations send their stdout/stderr.
    pub fn scheduler_log(&self) -> PathBuf {
        self.log_dir().join("scheduler.log")
    }
}

fn absolute(root: PathBuf) -> Result<PathBuf> {
    if root.is_absolute() {
        return Ok(root);
    }
    let cwd = std::env::current_dir().map_err(|e| {
        Error::Config(format!(
            "Cannot resolve {} without a working directory: {}",
            root.display(),
            e
        ))
    })?;
    Ok(cwd.join(root))
}
