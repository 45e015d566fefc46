use crate::output::UserOutput;
use stackward::docker::DockerClient;
use stackward::engine::compose::ComposeCommand;
use stackward::schedule::scheduler::{CrontabScheduler, Scheduler};

pub async fn run_doctor(out: &dyn UserOutput) -> anyhow::Result<()> {
    out.status("Checking system requirements...\n");

    let mut all_ok = true;

    out.progress("Docker daemon: ");
    if DockerClient::new().daemon_healthy().await {
        out.finish_progress("Running");
    } else {
        out.finish_progress("Not reachable (is docker installed and running?)");
        all_ok = false;
    }

    out.progress("Compose: ");
    match ComposeCommand::get().await {
        Ok(command) => out.finish_progress(&command.to_string()),
        Err(_) => {
            out.finish_progress("Not found (install the docker compose plugin)");
            all_ok = false;
        }
    }

    out.progress("Crontab: ");
    match CrontabScheduler::from_env().read() {
        Ok(_) => out.finish_progress("Usable"),
        Err(e) => {
            out.finish_progress(&e.to_string());
            all_ok = false;
        }
    }

    out.blank();
    if all_ok {
        out.success("All checks passed");
        Ok(())
    } else {
        anyhow::bail!("Some requirements are missing")
    }
}
