mod config;
mod doctor;
mod logs;
mod project;
mod status;
mod update;

pub use config::run_config;
pub use doctor::run_doctor;
pub use logs::run_logs;
pub use project::{run_add, run_list, run_remove, run_set_status};
pub use status::{run_locks, run_status};
pub use update::{run_update, run_update_all, run_update_single};

use anyhow::Context;
use stackward::config::{GlobalConfig, Paths, Settings};
use stackward::lock::{LockHandle, LockManager, GLOBAL_KEY};
use stackward::registry::{ProjectRecord, Registry};
use stackward::schedule::scheduler::{self, CrontabScheduler};

pub(crate) fn open_registry(paths: &Paths) -> anyhow::Result<Registry> {
    Ok(Registry::open_file(paths.registry_file())?)
}

pub(crate) fn load_settings(paths: &Paths) -> anyhow::Result<Settings> {
    Ok(GlobalConfig::load(&paths.config_file())?.settings()?)
}

/// Take the host-wide lock for registry changes.
pub(crate) fn lock_global(paths: &Paths) -> anyhow::Result<LockHandle> {
    Ok(LockManager::new(paths.lock_dir()).acquire(GLOBAL_KEY)?)
}

/// Resolve a project argument; `None` means the current directory.
pub(crate) fn resolve_project(registry: &Registry, project: Option<&str>) -> anyhow::Result<ProjectRecord> {
    let query = match project {
        Some(query) => query.to_string(),
        None => std::env::current_dir()
            .context("Failed to read the current directory")?
            .to_string_lossy()
            .into_owned(),
    };
    Ok(registry.find(&query)?.clone())
}

/// Rebuild managed crontab entries from the registry.
pub(crate) fn resync(paths: &Paths, registry: &Registry) -> anyhow::Result<()> {
    let exe = std::env::current_exe().context("Failed to locate the stackward executable")?;
    scheduler::sync(&CrontabScheduler::from_env(), registry.list(), &exe, paths)?;
    Ok(())
}
