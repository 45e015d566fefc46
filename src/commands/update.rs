use super::{load_settings, open_registry, resolve_project};
use crate::output::UserOutput;
use stackward::config::Paths;
use stackward::{BatchEvent, Orchestrator, ProjectRecord, UpdateReport};
use std::path::Path;

pub async fn run_update(paths: &Paths, project: Option<&str>, out: &dyn UserOutput) -> anyhow::Result<()> {
    let registry = open_registry(paths)?;
    let record = resolve_project(&registry, project)?;
    if !record.status.is_enabled() {
        out.warning(&format!(
            "{} is disabled for scheduled updates; updating anyway",
            record.name
        ));
    }
    update_one(paths, &record, out).await
}

/// Entry point for cron. Looks the project up by path only.
pub async fn run_update_single(paths: &Paths, path: &Path, out: &dyn UserOutput) -> anyhow::Result<()> {
    let registry = open_registry(paths)?;
    let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let Some(record) = registry.get(&canonical).cloned() else {
        anyhow::bail!("{} is not a registered project", path.display());
    };
    if !record.status.is_enabled() {
        out.status(&format!("{} is disabled, skipping", record.name));
        return Ok(());
    }
    update_one(paths, &record, out).await
}

pub async fn run_update_all(paths: &Paths, out: &dyn UserOutput) -> anyhow::Result<()> {
    let registry = open_registry(paths)?;
    let orchestrator = Orchestrator::for_host(paths, load_settings(paths)?)?;

    let mut skipped = 0;
    let reports = orchestrator
        .update_all(registry.list(), |event| match event {
            BatchEvent::Skipped(record) => {
                skipped += 1;
                out.status(&format!("Skipping {} (disabled)", record.name));
            }
            BatchEvent::Starting(record) => out.status(&format!("Updating {}...", record.name)),
            BatchEvent::Finished(report) => print_report(report, out),
        })
        .await;

    let failed = reports.iter().filter(|r| !r.is_success()).count();
    out.blank();
    out.status(&format!(
        "{} updated, {} failed, {} skipped",
        reports.len() - failed,
        failed,
        skipped
    ));
    if failed > 0 {
        anyhow::bail!("{} of {} project(s) failed to update", failed, reports.len());
    }
    Ok(())
}

async fn update_one(paths: &Paths, record: &ProjectRecord, out: &dyn UserOutput) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::for_host(paths, load_settings(paths)?)?;
    out.status(&format!("Updating {}...", record.name));
    let report = orchestrator.update(record).await;
    print_report(&report, out);

    match report.failure {
        Some(failure) => Err(failure.into()),
        None => Ok(()),
    }
}

fn print_report(report: &UpdateReport, out: &dyn UserOutput) {
    if report.is_success() {
        out.success(&report.message);
    } else {
        out.error(&report.message);
    }
    tracing::debug!(project = %report.project, trail = %report.trail(), "Phases visited");
}
