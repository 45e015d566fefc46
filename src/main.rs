mod cli;
mod commands;
mod output;

use clap::Parser;
use cli::{Cli, Commands};
use output::Console;
use stackward::config::Paths;
use stackward::registry::ProjectStatus;
use stackward::Error as StackwardError;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        if let Some(err) = e.downcast_ref::<StackwardError>() {
            eprintln!("Error: {}", err);
            if let Some(suggestion) = err.suggestion() {
                eprintln!("\nHint: {}", suggestion);
            }
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing()?;

    let paths = Paths::resolve(cli.home)?;
    paths.ensure()?;
    let out = Console::interactive();

    match cli.command {
        Commands::Add { dir, schedule } => commands::run_add(&paths, dir, schedule.into(), &out),
        Commands::Remove { project } => commands::run_remove(&paths, project.as_deref(), &out),
        Commands::List => commands::run_list(&paths, &out),
        Commands::Enable { project } => {
            commands::run_set_status(&paths, project.as_deref(), ProjectStatus::Enabled, &out)
        }
        Commands::Disable { project } => {
            commands::run_set_status(&paths, project.as_deref(), ProjectStatus::Disabled, &out)
        }
        Commands::Update { project } => {
            commands::run_update(&paths, project.as_deref(), &out).await
        }
        Commands::UpdateAll => commands::run_update_all(&paths, &out).await,
        Commands::UpdateSingle { path } => {
            commands::run_update_single(&paths, &path, &Console::scheduled()).await
        }
        Commands::Status => commands::run_status(&paths, &out),
        Commands::Logs { project, lines } => {
            commands::run_logs(&paths, project.as_deref(), lines, &out)
        }
        Commands::Config { key, value, unset } => {
            commands::run_config(&paths, key.as_deref(), value.as_deref(), unset, &out)
        }
        Commands::Locks => commands::run_locks(&paths, &out),
        Commands::Doctor => commands::run_doctor(&out).await,
    }
}

fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
