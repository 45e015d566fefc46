//! Append-only log stream for one project.
//!
//! Every line is also emitted as a `tracing` event carrying a `project` field,
//! so the same history shows up on stderr when running interactively.

use crate::error::Result;
use chrono::Local;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        })
    }
}

#[derive(Debug, Clone)]
pub struct ProjectLog {
    project: String,
    path: Option<PathBuf>,
}

impl ProjectLog {
    pub fn new(project: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            project: project.into(),
            path: Some(path.into()),
        }
    }

    /// Log to tracing only.
    pub fn disabled(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            path: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn info(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!(project = %self.project, "{}", message);
        self.append(Level::Info, message);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        warn!(project = %self.project, "{}", message);
        self.append(Level::Warn, message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        error!(project = %self.project, "{}", message);
        self.append(Level::Error, message);
    }

    /// Append captured process output, one log line per output line.
    pub fn output(&self, source: &str, text: &str) {
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            self.append(Level::Info, &format!("{}: {}", source, line));
        }
    }

    /// Best-effort: a failed write never fails the caller.
    fn append(&self, level: Level, message: &str) {
        let Some(path) = &self.path else {
            return;
        };
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let line = format!(
            "[{}] {} {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            level,
            message
        );
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(mut file) => {
                let _ = file.write_all(line.as_bytes());
            }
            Err(e) => tracing::debug!("Cannot write {}: {}", path.display(), e),
        }
    }
}

/// The last `n` lines of the log at `path`. A missing file is empty.
pub fn tail(path: &Path, n: usize) -> Result<Vec<String>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let lines: Vec<&str> = contents.lines().collect();
    let start = lines.len().saturating_sub(n);
    Ok(lines[start..].iter().map(|l| l.to_string()).collect())
}
