use super::{open_registry, resolve_project};
use crate::output::UserOutput;
use stackward::config::Paths;
use stackward::project_log;

pub fn run_logs(
    paths: &Paths,
    project: Option<&str>,
    lines: usize,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let registry = open_registry(paths)?;
    let record = resolve_project(&registry, project)?;
    let log_path = paths.project_log(&record.name);

    let logs = project_log::tail(&log_path, lines)?;
    if logs.is_empty() {
        out.status(&format!("No logs available for '{}'", record.name));
        return Ok(());
    }
    out.status(&format!("Logs for {} ({}):", record.name, log_path.display()));
    out.status(&format!("{:-<50}", ""));
    for line in logs {
        out.status(&line);
    }
    Ok(())
}
