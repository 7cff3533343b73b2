//! # AutoPower Platform
//!
//! OS adapters behind the scheduler's traits.
//!
//! - [`SchtasksRepository`]: Windows Task Scheduler via `schtasks.exe`.
//! - [`FileTaskStore`]: JSON stand-in where no task scheduler is reachable.
//! - [`SystemShutdown`]: the host `shutdown` command plus a status ledger.

pub mod ledger;
pub mod runner;
pub mod schtasks;
pub mod shutdown;
pub mod store;
pub mod taskxml;

use std::sync::Arc;

use autopower_core::{Backend, PlatformConfig, ShutdownCommand, TaskRepository};

pub use ledger::{LedgerEntry, ShutdownLedger};
pub use runner::{CommandOutput, CommandRunner, SystemRunner};
pub use schtasks::SchtasksRepository;
pub use shutdown::{Flavor, SystemShutdown};
pub use store::FileTaskStore;

/// Task store and shutdown adapters for this host.
pub struct Adapters {
    pub repository: Arc<dyn TaskRepository>,
    pub shutdown: Arc<dyn ShutdownCommand>,
}

/// Build adapters from config.
pub fn build_adapters(config: &PlatformConfig) -> Adapters {
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::new(config.command_timeout_secs));
    let data_dir = config.data_dir();

    let repository: Arc<dyn TaskRepository> = match config.backend {
        Backend::Schtasks => Arc::new(SchtasksRepository::new(runner.clone(), &config.task_folder)),
        Backend::File => Arc::new(FileTaskStore::open(&data_dir)),
    };
    let shutdown = Arc::new(SystemShutdown::new(runner, Flavor::host(), &data_dir));

    tracing::debug!(
        "🔌 Adapters: repository={}, shutdown={:?}, data_dir={}",
        repository.name(),
        Flavor::host(),
        data_dir.display()
    );
    Adapters { repository, shutdown }
}
