//! Turning a directory into a registry record.

use crate::error::{Error, Result};
use crate::registry::{ProjectRecord, Registry};
use crate::schedule::Schedule;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Manifest file names recognized by compose, in lookup order.
pub const MANIFEST_NAMES: &[&str] = &[
    "compose.yaml",
    "compose.yml",
    "docker-compose.yaml",
    "docker-compose.yml",
];

/// Outcome of [`register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub record: ProjectRecord,
    /// True when the path was already registered and has been replaced.
    pub replaced: bool,
    /// Other registered paths that derive the same name.
    pub collisions: Vec<PathBuf>,
}

pub fn find_manifest(dir: &Path) -> Option<PathBuf> {
    MANIFEST_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Lowercased directory name with every non-alphanumeric character
/// replaced by `-`.
pub fn derive_name(path: &Path) -> Option<String> {
    let base = path.file_name()?.to_string_lossy();
    let name: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    Some(name)
}

/// Validate `dir` and build its record without touching the registry.
pub fn prepare(dir: &Path, schedule: Schedule) -> Result<ProjectRecord> {
    let path = std::fs::canonicalize(dir).map_err(|e| {
        Error::Registration(format!("Cannot resolve {}: {}", dir.display(), e))
    })?;
    if !path.is_dir() {
        return Err(Error::Registration(format!(
            "{} is not a directory",
            path.display()
        )));
    }
    if find_manifest(&path).is_none() {
        return Err(Error::Registration(format!(
            "No compose manifest in {} (looked for {})",
            path.display(),
            MANIFEST_NAMES.join(", ")
        )));
    }
    let name = derive_name(&path).ok_or_else(|| {
        Error::Registration(format!(
            "Cannot derive a project name from {}",
            path.display()
        ))
    })?;
    Ok(ProjectRecord::new(path, name, schedule))
}

/// Validate `dir` and upsert it into `registry`.
///
/// A name shared with a different path is reported, not rejected: the
/// registry is keyed on path, but the two projects will share a lock and a
/// log file.
pub fn register(registry: &mut Registry, dir: &Path, schedule: Schedule) -> Result<Registration> {
    let record = prepare(dir, schedule)?;
    let replaced = registry.get(&record.path).is_some();
    let collisions: Vec<PathBuf> = registry
        .by_name(&record.name)
        .into_iter()
        .filter(|other| other.path != record.path)
        .map(|other| other.path.clone())
        .collect();
    for other in &collisions {
        warn!(
            name = %record.name,
            "Project name is also used by {}; both will share a lock and log file",
            other.display()
        );
    }

    registry.add(record.clone())?;
    Ok(Registration {
        record,
        replaced,
        collisions,
    })
}
