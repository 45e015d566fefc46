//! Durable registry of managed projects.
//!
//! [`Registry`] is the in-memory view every command works against. Persistence
//! is delegated to a [`RegistryStore`]; the production store is the
//! pipe-delimited [`FileRegistryStore`], tests use [`MemoryRegistryStore`].
//!
//! The registry is keyed on the canonical project path. Names are derived and
//! may collide between distinct paths, so name lookups can be ambiguous.

pub mod store;

pub use store::{FileRegistryStore, MemoryRegistryStore, RegistryStore};

use crate::error::{Error, Result};
use crate::schedule::Schedule;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Whether scheduled and bulk updates include the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectStatus {
    Enabled,
    Disabled,
}

impl ProjectStatus {
    pub fn is_enabled(&self) -> bool {
        matches!(self, ProjectStatus::Enabled)
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectStatus::Enabled => f.write_str("enabled"),
            ProjectStatus::Disabled => f.write_str("disabled"),
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "enabled" => Ok(ProjectStatus::Enabled),
            "disabled" => Ok(ProjectStatus::Disabled),
            other => Err(Error::Config(format!("Unknown project status '{}'", other))),
        }
    }
}

/// One registered project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRecord {
    /// Canonical absolute path, the registry key.
    pub path: PathBuf,
    /// Slug used for lock and log file names.
    pub name: String,
    pub schedule: Schedule,
    pub status: ProjectStatus,
}

impl ProjectRecord {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>, schedule: Schedule) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            schedule,
            status: ProjectStatus::Enabled,
        }
    }
}

/// In-memory project registry backed by a persistence port.
pub struct Registry {
    store: Box<dyn RegistryStore>,
    records: Vec<ProjectRecord>,
}

impl Registry {
    /// Load the current records from `store`.
    pub fn open(store: Box<dyn RegistryStore>) -> Result<Self> {
        let records = store.load()?;
        Ok(Self { store, records })
    }

    /// Open the pipe-delimited registry file at `path`.
    pub fn open_file(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open(Box::new(FileRegistryStore::new(path)))
    }

    /// Upsert by path. An existing record for the same path is replaced and
    /// moves to the end of the list.
    pub fn add(&mut self, record: ProjectRecord) -> Result<()> {
        let mut next = self.records.clone();
        next.retain(|r| r.path != record.path);
        next.push(record);
        self.commit(next)
    }

    /// Delete the record for `path`. Returns whether one existed.
    pub fn remove(&mut self, path: &Path) -> Result<bool> {
        if !self.records.iter().any(|r| r.path == path) {
            return Ok(false);
        }
        let next = self
            .records
            .iter()
            .filter(|r| r.path != path)
            .cloned()
            .collect();
        self.commit(next)?;
        Ok(true)
    }

    /// Change the status of the record for `path`. Returns false, without
    /// error, if the path is not registered.
    pub fn set_status(&mut self, path: &Path, status: ProjectStatus) -> Result<bool> {
        let Some(idx) = self.records.iter().position(|r| r.path == path) else {
            return Ok(false);
        };
        if self.records[idx].status == status {
            return Ok(true);
        }
        let mut next = self.records.clone();
        next[idx].status = status;
        self.commit(next)?;
        Ok(true)
    }

    /// All records in file order.
    pub fn list(&self) -> &[ProjectRecord] {
        &self.records
    }

    pub fn get(&self, path: &Path) -> Option<&ProjectRecord> {
        self.records.iter().find(|r| r.path == path)
    }

    /// Records sharing `name`, in file order.
    pub fn by_name(&self, name: &str) -> Vec<&ProjectRecord> {
        self.records.iter().filter(|r| r.name == name).collect()
    }

    /// Resolve a user-supplied reference: a registered path (canonicalized if
    /// it exists on disk) or a project name that matches exactly one record.
    pub fn find(&self, query: &str) -> Result<&ProjectRecord> {
        let as_path = Path::new(query);
        let canonical = std::fs::canonicalize(as_path).unwrap_or_else(|_| as_path.to_path_buf());
        if let Some(record) = self.get(&canonical).or_else(|| self.get(as_path)) {
            return Ok(record);
        }

        let matches = self.by_name(query);
        match matches.as_slice() {
            [] => Err(Error::ProjectNotFound(query.to_string())),
            [one] => Ok(one),
            many => Err(Error::AmbiguousProject {
                name: query.to_string(),
                paths: many.iter().map(|r| r.path.display().to_string()).collect(),
            }),
        }
    }

    /// Re-read the store, discarding the in-memory view.
    pub fn reload(&mut self) -> Result<()> {
        self.records = self.store.load()?;
        Ok(())
    }

    /// Persist first, then swap the in-memory view, so a failed write leaves
    /// both unchanged.
    fn commit(&mut self, next: Vec<ProjectRecord>) -> Result<()> {
        self.store.save(&next)?;
        self.records = next;
        Ok(())
    }
}
