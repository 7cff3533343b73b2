//! Per-name task locks: at most one operation in flight per reserved name.
//!
//! A set/remove against the external store is a delete-then-create sequence;
//! holding the name's slot for the whole sequence keeps two callers from
//! interleaving their deletes and creates.

use std::sync::Arc;

use chrono::{DateTime, Local};
use tokio::sync::{Mutex, OwnedMutexGuard};

use autopower_core::TaskName;

/// Per-name state, reachable only while the name is locked.
#[derive(Debug, Default)]
pub struct TaskSlot {
    total_ops: u64,
    last_op: Option<&'static str>,
    last_at: Option<DateTime<Local>>,
}

impl TaskSlot {
    /// Record a completed operation on this name.
    pub fn record(&mut self, op: &'static str) {
        self.total_ops += 1;
        self.last_op = Some(op);
        self.last_at = Some(Local::now());
    }
}

/// Held while operating on a task name.
pub type TaskGuard = OwnedMutexGuard<TaskSlot>;

/// One mutex per reserved task name.
pub struct TaskLocks {
    slots: [Arc<Mutex<TaskSlot>>; 4],
}

impl TaskLocks {
    pub fn new() -> Self {
        Self {
            slots: [
                Arc::new(Mutex::new(TaskSlot::default())),
                Arc::new(Mutex::new(TaskSlot::default())),
                Arc::new(Mutex::new(TaskSlot::default())),
                Arc::new(Mutex::new(TaskSlot::default())),
            ],
        }
    }

    /// Wait for exclusive access to `name`.
    pub async fn lock(&self, name: TaskName) -> TaskGuard {
        let slot = self.slots[name.index()].clone();
        let guard = slot.lock_owned().await;
        tracing::trace!("🔒 {} locked", name);
        guard
    }

    /// Lock both stage names, always StageBoot first.
    pub async fn lock_stage(&self) -> (TaskGuard, TaskGuard) {
        let boot = self.lock(TaskName::StageBoot).await;
        let shutdown = self.lock(TaskName::StageShutdown).await;
        (boot, shutdown)
    }

    /// Get statistics for all names.
    pub async fn stats(&self) -> Vec<TaskLockStats> {
        let mut result = Vec::with_capacity(4);
        for name in TaskName::ALL {
            let slot = self.slots[name.index()].lock().await;
            result.push(TaskLockStats {
                name,
                total_ops: slot.total_ops,
                last_op: slot.last_op,
                last_at: slot.last_at,
            });
        }
        result
    }
}

impl Default for TaskLocks {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics for a single task name.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TaskLockStats {
    pub name: TaskName,
    pub total_ops: u64,
    pub last_op: Option<&'static str>,
    pub last_at: Option<DateTime<Local>>,
}
