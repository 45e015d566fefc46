//! Host-local, non-blocking mutual exclusion keyed by name.
//!
//! Each key maps to `<lock_dir>/<key>.lock` guarded by an advisory `flock`.
//! The OS drops the lock when the descriptor closes, so a crashed or killed
//! process never leaves a held lock behind. The file itself stays; its
//! contents (`pid` line, then an RFC 3339 acquisition time) only describe the
//! last holder and are used by [`LockManager::inspect`].

use crate::error::{Error, Result};
use chrono::{DateTime, Local};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Key for administrative operations that must not race any other instance.
pub const GLOBAL_KEY: &str = "global";

const LOCK_EXT: &str = "lock";

pub struct LockManager {
    dir: PathBuf,
}

/// Exclusive possession of one key. Dropping it releases the lock.
#[derive(Debug)]
pub struct LockHandle {
    key: String,
    path: PathBuf,
    file: File,
}

/// Snapshot of one lock file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockStatus {
    pub key: String,
    pub path: PathBuf,
    /// Whether some process holds the lock right now.
    pub held: bool,
    /// Last recorded holder.
    pub pid: Option<u32>,
    pub since: Option<DateTime<Local>>,
}

impl LockStatus {
    /// The file names a holder whose process is gone, yet nobody holds the lock.
    pub fn is_stale(&self) -> bool {
        !self.held && self.pid.is_some_and(|pid| !process_alive(pid))
    }
}

impl LockManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", sanitize_key(key), LOCK_EXT))
    }

    /// Try to take `key` without waiting.
    ///
    /// Returns [`Error::LockBusy`] if another handle, in this process or any
    /// other, already holds it.
    pub fn acquire(&self, key: &str) -> Result<LockHandle> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if let Err(e) = FileExt::try_lock_exclusive(&file) {
            debug!(key, "Lock busy: {}", e);
            return Err(Error::LockBusy {
                key: key.to_string(),
            });
        }

        // Holder details are informational only
        let _ = file.set_len(0);
        let _ = writeln!(
            file,
            "{}\n{}",
            std::process::id(),
            Local::now().to_rfc3339()
        );
        let _ = file.flush();

        debug!(key, path = %path.display(), "Acquired lock");
        Ok(LockHandle {
            key: key.to_string(),
            path,
            file,
        })
    }

    /// Report who last took `key` and whether it is held now.
    pub fn inspect(&self, key: &str) -> Result<LockStatus> {
        self.inspect_path(key, &self.path_for(key))
    }

    /// Every lock file in the directory, sorted by key.
    pub fn list(&self) -> Result<Vec<LockStatus>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut statuses = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(LOCK_EXT) {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            statuses.push(self.inspect_path(key, &path)?);
        }
        statuses.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(statuses)
    }

    fn inspect_path(&self, key: &str, path: &Path) -> Result<LockStatus> {
        let mut status = LockStatus {
            key: key.to_string(),
            path: path.to_path_buf(),
            held: false,
            pid: None,
            since: None,
        };
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(status),
            Err(e) => return Err(e.into()),
        };

        match FileExt::try_lock_shared(&file) {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
            }
            Err(_) => status.held = true,
        }

        let contents = fs::read_to_string(path).unwrap_or_default();
        let mut lines = contents.lines();
        status.pid = lines.next().and_then(|l| l.trim().parse().ok());
        status.since = lines
            .next()
            .and_then(|l| DateTime::parse_from_rfc3339(l.trim()).ok())
            .map(|t| t.with_timezone(&Local));
        Ok(status)
    }
}

impl LockHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Release now instead of at drop.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!(key = %self.key, path = %self.path.display(), "Released lock");
    }
}

/// Keep lock file names inside the lock directory.
fn sanitize_key(key: &str) -> String {
    let cleaned: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect();
    match cleaned.trim_start_matches('.') {
        "" => "_".to_string(),
        rest => rest.to_string(),
    }
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    // Signal 0 only checks existence; EPERM still means the process exists
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}
