use super::{lock_global, open_registry, resolve_project, resync};
use crate::output::UserOutput;
use stackward::config::Paths;
use stackward::registration;
use stackward::registry::ProjectStatus;
use stackward::schedule::{self, ScheduleRequest};
use std::path::PathBuf;

pub fn run_add(
    paths: &Paths,
    dir: Option<PathBuf>,
    request: ScheduleRequest,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    // Validate before taking the lock so bad input never touches the registry
    let schedule = schedule::compile(&request)?;
    let dir = match dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    let _lock = lock_global(paths)?;
    let mut registry = open_registry(paths)?;
    let registration = registration::register(&mut registry, &dir, schedule)?;

    for other in &registration.collisions {
        out.warning(&format!(
            "Project name '{}' is also used by {}; both share a lock and a log file",
            registration.record.name,
            other.display()
        ));
    }
    resync(paths, &registry)?;

    let verb = if registration.replaced {
        "Updated"
    } else {
        "Registered"
    };
    out.success(&format!(
        "{} {} ({}), {}",
        verb,
        registration.record.name,
        registration.record.path.display(),
        registration.record.schedule.describe()
    ));
    Ok(())
}

pub fn run_remove(paths: &Paths, project: Option<&str>, out: &dyn UserOutput) -> anyhow::Result<()> {
    let _lock = lock_global(paths)?;
    let mut registry = open_registry(paths)?;
    let record = resolve_project(&registry, project)?;

    registry.remove(&record.path)?;
    resync(paths, &registry)?;
    out.success(&format!("Removed {} ({})", record.name, record.path.display()));
    Ok(())
}

pub fn run_set_status(
    paths: &Paths,
    project: Option<&str>,
    status: ProjectStatus,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let _lock = lock_global(paths)?;
    let mut registry = open_registry(paths)?;
    let record = resolve_project(&registry, project)?;

    if record.status == status {
        out.status(&format!("{} is already {}", record.name, status));
        return Ok(());
    }
    registry.set_status(&record.path, status)?;
    resync(paths, &registry)?;
    out.success(&format!("{} is now {}", record.name, status));
    Ok(())
}

pub fn run_list(paths: &Paths, out: &dyn UserOutput) -> anyhow::Result<()> {
    let registry = open_registry(paths)?;
    if registry.list().is_empty() {
        out.status("No projects registered. Add one with: stackward add <dir> --every 6");
        return Ok(());
    }

    out.status(&format!(
        "  {:<20} {:<9} {:<24} PATH",
        "NAME", "STATUS", "SCHEDULE"
    ));
    out.status(&format!("{:-<80}", ""));
    for record in registry.list() {
        let marker = if record.status.is_enabled() { "+" } else { "o" };
        out.status(&format!(
            "{} {:<20} {:<9} {:<24} {}",
            marker,
            record.name,
            record.status.to_string(),
            record.schedule.describe(),
            record.path.display()
        ));
    }
    Ok(())
}
