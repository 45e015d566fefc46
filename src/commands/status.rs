use super::open_registry;
use crate::output::UserOutput;
use stackward::config::Paths;
use stackward::lock::LockManager;
use stackward::project_log;

pub fn run_status(paths: &Paths, out: &dyn UserOutput) -> anyhow::Result<()> {
    let registry = open_registry(paths)?;
    let locks = LockManager::new(paths.lock_dir());

    out.status("Project Status:");
    out.status(&format!("{:-<50}", ""));
    if registry.list().is_empty() {
        out.status("  No projects registered");
        return Ok(());
    }

    for record in registry.list() {
        let lock = locks.inspect(&record.name)?;
        let icon = if lock.held {
            "."
        } else if record.status.is_enabled() {
            "+"
        } else {
            "o"
        };
        let state = if lock.held { "updating" } else { "idle" };

        out.status(&format!(
            "  {} {:<20} {:<9} {:<9} {}",
            icon,
            record.name,
            record.status.to_string(),
            state,
            record.schedule.describe()
        ));
        out.status(&format!("      path: {}", record.path.display()));
        let last = project_log::tail(&paths.project_log(&record.name), 1)?;
        match last.first() {
            Some(line) => out.status(&format!("      last: {}", line)),
            None => out.status("      last: (no updates yet)"),
        }
    }
    Ok(())
}

pub fn run_locks(paths: &Paths, out: &dyn UserOutput) -> anyhow::Result<()> {
    let locks = LockManager::new(paths.lock_dir()).list()?;
    if locks.is_empty() {
        out.status("No lock files");
        return Ok(());
    }

    out.status(&format!("  {:<20} {:<8} {:<8} SINCE", "KEY", "STATE", "PID"));
    for lock in locks {
        let state = if lock.held {
            "held"
        } else if lock.is_stale() {
            "stale"
        } else {
            "free"
        };
        let pid = lock.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
        let since = lock
            .since
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        out.status(&format!("  {:<20} {:<8} {:<8} {}", lock.key, state, pid, since));
    }
    Ok(())
}
