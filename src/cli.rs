use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use stackward::schedule::ScheduleRequest;

#[derive(Parser)]
#[command(name = "stackward")]
#[command(about = "Stackward - Scheduled compose updates with health checks and automatic rollback")]
#[command(version)]
pub struct Cli {
    /// State directory (defaults to ~/.stackward)
    #[arg(long, global = true, env = "STACKWARD_HOME")]
    pub home: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// How often a project is updated. Use exactly one form.
#[derive(Args, Debug, Clone, Default)]
pub struct ScheduleArgs {
    /// Update every N hours (1-23)
    #[arg(long, value_name = "HOURS")]
    pub every: Option<String>,

    /// Update at a time of day, e.g. 04:30, 4.30 or 2:30pm
    #[arg(long, value_name = "TIME")]
    pub at: Option<String>,

    /// Restrict --at to weekdays, e.g. mon,thu
    #[arg(long, value_name = "DAYS", requires = "at")]
    pub days: Option<String>,

    /// Raw 5-field cron expression or @daily-style literal
    #[arg(long, value_name = "EXPR")]
    pub cron: Option<String>,
}

impl From<ScheduleArgs> for ScheduleRequest {
    fn from(args: ScheduleArgs) -> Self {
        ScheduleRequest {
            every: args.every,
            at: args.at,
            days: args.days,
            cron: args.cron,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register a compose project (or change its schedule)
    Add {
        /// Project directory (defaults to the current directory)
        dir: Option<PathBuf>,

        #[command(flatten)]
        schedule: ScheduleArgs,
    },
    /// Unregister a project
    Remove {
        /// Project name or path (defaults to the current directory)
        project: Option<String>,
    },
    /// List registered projects
    List,
    /// Include a project in scheduled updates
    Enable {
        /// Project name or path (defaults to the current directory)
        project: Option<String>,
    },
    /// Exclude a project from scheduled updates
    Disable {
        /// Project name or path (defaults to the current directory)
        project: Option<String>,
    },
    /// Update a project now
    Update {
        /// Project name or path (defaults to the current directory)
        project: Option<String>,
    },
    /// Update every enabled project, one after another
    UpdateAll,
    /// Update one project by path (used by scheduled runs)
    UpdateSingle {
        /// Registered project directory
        path: PathBuf,
    },
    /// Show schedule, lock and last log line for every project
    Status,
    /// Show a project's update log
    Logs {
        /// Project name or path (defaults to the current directory)
        project: Option<String>,
        /// Number of lines to show
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: usize,
    },
    /// Show or change global settings
    Config {
        /// Setting name, e.g. WEBHOOK_URL or HEALTH_TIMEOUT
        key: Option<String>,
        /// New value
        value: Option<String>,
        /// Remove the setting
        #[arg(long, conflicts_with = "value", requires = "key")]
        unset: bool,
    },
    /// Show lock files and who holds them
    Locks,
    /// Check that docker, compose and crontab are usable
    Doctor,
}
