#![allow(unused_assignments)]

//! # Stackward
//!
//! Scheduled, self-healing updates for compose projects.
//!
//! ## Features
//!
//! - **Project Registry**: Projects are registered by directory and persisted in a
//!   pipe-delimited file that is rewritten atomically on every change
//! - **Schedules**: Hour intervals, times of day with optional weekdays, or raw cron
//!   expressions, kept in sync with the user's crontab
//! - **Safe Updates**: pull → recreate → health check, with automatic rollback to the
//!   previously running images on failure
//! - **Hooks**: Optional `pre-update.sh` / `post-update.sh` with ownership checks
//! - **Locking**: Host-local advisory locks so one project never updates twice at once
//! - **Notifications**: Success and failure reports to a webhook
//!
//! ## Quick Start
//!
//! ```no_run
//! use stackward::config::{GlobalConfig, Paths};
//! use stackward::registry::Registry;
//! use stackward::Orchestrator;
//!
//! # async fn example() -> Result<(), stackward::Error> {
//! let paths = Paths::resolve(None)?;
//! let settings = GlobalConfig::load(&paths.config_file())?.settings()?;
//! let registry = Registry::open_file(paths.registry_file())?;
//!
//! let orchestrator = Orchestrator::for_host(&paths, settings)?;
//! for report in orchestrator.update_all(registry.list(), |_| {}).await {
//!     println!("{}: {}", report.project, report.message);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Model
//!
//! One process runs one sequential flow. `update_all` updates projects one
//! after another; parallelism across projects comes from cron starting
//! independent processes, which per-project locks keep apart.

pub mod config;
pub mod docker;
pub mod engine;
pub mod error;
pub mod fsutil;
pub mod health;
pub mod hooks;
pub mod lock;
pub mod notify;
pub mod orchestrator;
pub mod project_log;
pub mod registration;
pub mod registry;
pub mod rollback;
pub mod schedule;

// Re-export commonly used types
pub use config::{GlobalConfig, Paths, Settings};
pub use error::{Error, Result};
pub use orchestrator::{BatchEvent, Orchestrator, UpdatePhase, UpdateReport};
pub use registry::{ProjectRecord, ProjectStatus, Registry};
pub use schedule::Schedule;
