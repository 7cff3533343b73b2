//! Adapter seams consumed by the scheduling manager.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{PendingShutdown, ShutdownAction, TaskDefinition, TaskName, TriggerRecord};

/// External task store (Windows Task Scheduler or a stand-in).
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Delete any task under `name` (absent is fine), then register `definition`.
    async fn upsert(&self, name: TaskName, definition: &TaskDefinition) -> Result<()>;

    /// Delete the task if present. Absent is success.
    async fn remove(&self, name: TaskName) -> Result<()>;

    /// Look up a task. `None` means no such task.
    async fn find(&self, name: TaskName) -> Result<Option<TaskDefinition>>;

    /// Triggers of a registered task, in registration order.
    async fn list_triggers(&self, name: TaskName) -> Result<Vec<TriggerRecord>> {
        Ok(self
            .find(name)
            .await?
            .map(|def| def.triggers)
            .unwrap_or_default())
    }
}

/// OS delayed-shutdown facility.
#[async_trait]
pub trait ShutdownCommand: Send + Sync {
    /// Arm a countdown, replacing any armed one.
    async fn arm(&self, delay_secs: u64, action: ShutdownAction, message: &str) -> Result<()>;

    /// Clear any armed countdown. No-op when nothing is armed.
    async fn cancel(&self) -> Result<()>;

    /// Non-destructive status query.
    async fn status(&self) -> Result<PendingShutdown> {
        Ok(PendingShutdown::Unknown)
    }

    /// Issue a cancel and report whether something was armed.
    ///
    /// This cancels a pending shutdown as a side effect of checking it.
    async fn probe_by_cancel(&self) -> Result<bool>;
}

/// Best-effort user-facing message sink.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, title: &str, body: &str) -> std::result::Result<(), String>;
}

/// Yes/no gate in front of irreversible actions.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Always answers the same way; handy for `--yes` and tests.
pub struct FixedAnswer(pub bool);

impl Confirm for FixedAnswer {
    fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}
