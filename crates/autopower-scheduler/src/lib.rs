//! # AutoPower Scheduler
//!
//! Turns user schedules into task definitions for the OS task store and
//! keeps the four reserved tasks consistent.
//!
//! ## Architecture
//! ```text
//! PowerScheduler
//!   ├── validate request (future instant, non-empty days, boot < shutdown)
//!   ├── trigger calculator → OneShot | Daily | Weekly(day, time)
//!   ├── TaskLocks: one in-flight operation per task name
//!   ├── TaskRepository.upsert / remove / find   (Boot, StageBoot, StageShutdown)
//!   ├── ShutdownCommand.arm / cancel / status   (live countdown, never stored)
//!   └── NotifyRouter → notification sinks (best effort)
//! ```

pub mod locks;
pub mod manager;
pub mod notify;
pub mod summary;
pub mod trigger;

pub use locks::{TaskLockStats, TaskLocks};
pub use manager::{PendingStatus, PowerScheduler, ProbeMode, Report};
pub use notify::{LogSink, Notification, NotifyRouter};
pub use trigger::{StageRole, boot_trigger, build_stage_triggers, next_weekday_on_or_after_tomorrow};
