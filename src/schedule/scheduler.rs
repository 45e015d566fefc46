//! Scheduler collaborator: keeps crontab in step with the registry.
//!
//! Resync is always a full rebuild. Every line carrying [`MARKER`] is dropped
//! and one line per enabled project is appended; all other lines are kept
//! exactly as they were.

use crate::config::Paths;
use crate::error::{Error, Result};
use crate::registry::ProjectRecord;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Tag identifying crontab lines this tool owns.
pub const MARKER: &str = "# stackward:";

/// One managed crontab line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronEntry {
    pub recurrence: String,
    pub command: String,
    pub log_path: PathBuf,
    pub name: String,
}

impl CronEntry {
    /// Entry that runs `update-single` for `record`.
    pub fn for_project(record: &ProjectRecord, exe: &Path, paths: &Paths) -> Self {
        let command = format!(
            "{} --home {} update-single {}",
            shell_quote(&exe.to_string_lossy()),
            shell_quote(&paths.root().to_string_lossy()),
            shell_quote(&record.path.to_string_lossy()),
        );
        Self {
            recurrence: record.schedule.cron_expression(),
            command,
            log_path: paths.scheduler_log(),
            name: record.name.clone(),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "{} {} >> {} 2>&1 {}{}",
            self.recurrence,
            self.command,
            shell_quote(&self.log_path.to_string_lossy()),
            MARKER,
            self.name
        )
    }
}

/// Quote for `/bin/sh` and escape `%`, which cron turns into a newline.
fn shell_quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+:=,@".contains(c));
    let quoted = if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    };
    quoted.replace('%', r"\%")
}

pub fn is_managed(line: &str) -> bool {
    line.contains(MARKER)
}

/// Replace every managed line in `existing` with `entries`.
pub fn rebuild(existing: &str, entries: &[CronEntry]) -> String {
    let mut out: Vec<String> = existing
        .lines()
        .filter(|line| !is_managed(line))
        .map(str::to_string)
        .collect();
    out.extend(entries.iter().map(CronEntry::render));

    let mut table = out.join("\n");
    if !table.is_empty() {
        table.push('\n');
    }
    table
}

/// Read and replace the user's schedule table.
pub trait Scheduler: Send + Sync {
    fn read(&self) -> Result<String>;

    fn install(&self, table: &str) -> Result<()>;
}

/// Environment variable naming an alternative `crontab` program.
pub const CRONTAB_ENV: &str = "STACKWARD_CRONTAB";

/// The host's `crontab` for the current user.
#[derive(Debug, Clone)]
pub struct CrontabScheduler {
    program: PathBuf,
}

impl CrontabScheduler {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// `$STACKWARD_CRONTAB` if set, else `crontab` from `PATH`.
    pub fn from_env() -> Self {
        match std::env::var_os(CRONTAB_ENV) {
            Some(program) if !program.is_empty() => Self::new(program),
            _ => Self::default(),
        }
    }
}

impl Default for CrontabScheduler {
    fn default() -> Self {
        Self::new("crontab")
    }
}

impl Scheduler for CrontabScheduler {
    fn read(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .arg("-l")
            .output()
            .map_err(|e| Error::Scheduler(format!("Failed to run 'crontab -l': {}", e)))?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.to_lowercase().contains("no crontab") {
            debug!("No crontab installed yet");
            return Ok(String::new());
        }
        Err(Error::Scheduler(format!(
            "'crontab -l' failed: {}",
            stderr.trim()
        )))
    }

    fn install(&self, table: &str) -> Result<()> {
        let mut child = Command::new(&self.program)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Scheduler(format!("Failed to run 'crontab -': {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(table.as_bytes())
                .map_err(|e| Error::Scheduler(format!("Failed to write crontab: {}", e)))?;
        }
        let output = child
            .wait_with_output()
            .map_err(|e| Error::Scheduler(format!("Failed to wait for 'crontab -': {}", e)))?;
        if !output.status.success() {
            return Err(Error::Scheduler(format!(
                "'crontab -' rejected the table: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// Full rebuild of managed entries from the enabled `records`.
pub fn sync(
    scheduler: &dyn Scheduler,
    records: &[ProjectRecord],
    exe: &Path,
    paths: &Paths,
) -> Result<()> {
    let entries: Vec<CronEntry> = records
        .iter()
        .filter(|r| r.status.is_enabled())
        .map(|r| CronEntry::for_project(r, exe, paths))
        .collect();

    let existing = scheduler.read()?;
    let table = rebuild(&existing, &entries);
    if table == existing {
        debug!("Schedule table already up to date");
        return Ok(());
    }
    scheduler.install(&table)?;
    info!(entries = entries.len(), "Schedule table synchronized");
    Ok(())
}
