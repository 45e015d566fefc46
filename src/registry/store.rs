use super::{ProjectRecord, ProjectStatus};
use crate::error::{Error, Result};
use crate::fsutil::atomic_write;
use crate::schedule::Schedule;
use parking_lot::Mutex;
use std::fs;
use std::path::PathBuf;

/// Persistence port for the registry.
///
/// `save` receives the complete record list and must replace the stored state
/// atomically: concurrent readers see the old list or the new one, never a mix.
pub trait RegistryStore: Send + Sync {
    fn load(&self) -> Result<Vec<ProjectRecord>>;

    fn save(&self, records: &[ProjectRecord]) -> Result<()>;
}

/// Line-oriented registry file: `path|name|schedule|status`.
///
/// Blank lines and `#` comments are ignored on load and dropped on save.
pub struct FileRegistryStore {
    path: PathBuf,
}

impl FileRegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RegistryStore for FileRegistryStore {
    fn load(&self) -> Result<Vec<ProjectRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            Error::Config(format!(
                "Failed to read registry {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let mut records = Vec::new();
        for (idx, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let record = parse_line(line).map_err(|reason| {
                Error::Config(format!(
                    "{}:{}: {}",
                    self.path.display(),
                    idx + 1,
                    reason
                ))
            })?;
            records.push(record);
        }
        Ok(records)
    }

    fn save(&self, records: &[ProjectRecord]) -> Result<()> {
        let mut out = String::new();
        for record in records {
            out.push_str(&format_line(record)?);
            out.push('\n');
        }
        atomic_write(&self.path, &out)
    }
}

pub(crate) fn format_line(record: &ProjectRecord) -> Result<String> {
    let path = record.path.to_str().ok_or_else(|| {
        Error::Registration(format!(
            "Path is not valid UTF-8: {}",
            record.path.display()
        ))
    })?;
    let schedule = record.schedule.to_string();
    for (field, value) in [
        ("path", path),
        ("name", record.name.as_str()),
        ("schedule", schedule.as_str()),
    ] {
        if value.contains('|') || value.contains('\n') {
            return Err(Error::Registration(format!(
                "Project {} '{}' may not contain '|' or newlines",
                field, value
            )));
        }
    }
    Ok(format!(
        "{}|{}|{}|{}",
        path, record.name, schedule, record.status
    ))
}

pub(crate) fn parse_line(line: &str) -> std::result::Result<ProjectRecord, String> {
    let fields: Vec<&str> = line.split('|').collect();
    let [path, name, schedule, status] = fields.as_slice() else {
        return Err(format!(
            "expected 4 '|'-separated fields, found {}",
            fields.len()
        ));
    };
    let schedule: Schedule = schedule.parse().map_err(|e: Error| e.to_string())?;
    let status: ProjectStatus = status.parse().map_err(|e: Error| e.to_string())?;
    Ok(ProjectRecord {
        path: PathBuf::from(*path),
        name: name.to_string(),
        schedule,
        status,
    })
}

/// Registry store held in memory, for tests and dry runs.
#[derive(Default)]
pub struct MemoryRegistryStore {
    records: Mutex<Vec<ProjectRecord>>,
}

impl MemoryRegistryStore {
    pub fn with_records(records: Vec<ProjectRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }
}

impl RegistryStore for MemoryRegistryStore {
    fn load(&self) -> Result<Vec<ProjectRecord>> {
        Ok(self.records.lock().clone())
    }

    fn save(&self, records: &[ProjectRecord]) -> Result<()> {
        *self.records.lock() = records.to_vec();
        Ok(())
    }
}
