//! # AutoPower Core
//!
//! Shared data model, error taxonomy, configuration and the adapter traits
//! through which the scheduling manager reaches the operating system.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{AppSettings, AutoPowerConfig, Backend, PlatformConfig, SchedulerConfig};
pub use error::{AutoPowerError, Result};
pub use traits::{Confirm, FixedAnswer, NotificationSink, ShutdownCommand, TaskRepository};
pub use types::{
    BatteryPolicy, DaySet, PendingShutdown, RunLevel, ScheduleRow, ShutdownAction, TaskAction,
    TaskDefinition, TaskName, TriggerRecord, day_name,
};
