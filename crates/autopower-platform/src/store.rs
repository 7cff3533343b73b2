//! File-based task store: tasks.json instead of the OS scheduler.
//!
//! Nothing fires from here. Used on hosts without Task Scheduler and for
//! previewing what AutoPower would register.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use autopower_core::{Result, TaskDefinition, TaskName, TaskRepository};

pub struct FileTaskStore {
    file: PathBuf,
    tasks: Mutex<BTreeMap<String, TaskDefinition>>,
}

impl FileTaskStore {
    /// Open (or start) the store in `dir`. Unreadable files start empty.
    pub fn open(dir: &Path) -> Self {
        let file = dir.join("tasks.json");
        let tasks = match std::fs::read_to_string(&file) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!("⚠️ Failed to parse {}: {e}", file.display());
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self {
            file,
            tasks: Mutex::new(tasks),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file
    }

    fn persist(&self, tasks: &BTreeMap<String, TaskDefinition>) -> Result<()> {
        if let Some(parent) = self.file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.file, serde_json::to_string_pretty(tasks)?)?;
        tracing::debug!("💾 Saved {} tasks to {}", tasks.len(), self.file.display());
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for FileTaskStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn upsert(&self, name: TaskName, definition: &TaskDefinition) -> Result<()> {
        let mut tasks = self.tasks.lock().await;
        let mut next = tasks.clone();
        next.insert(name.to_string(), definition.clone());
        self.persist(&next)?;
        *tasks = next;
        Ok(())
    }

    async fn remove(&self, name: TaskName) -> Result<()> {
        let mut tasks = self.tasks.lock().await;
        if !tasks.contains_key(name.as_str()) {
            return Ok(());
        }
        let mut next = tasks.clone();
        next.remove(name.as_str());
        self.persist(&next)?;
        *tasks = next;
        Ok(())
    }

    async fn find(&self, name: TaskName) -> Result<Option<TaskDefinition>> {
        Ok(self.tasks.lock().await.get(name.as_str()).cloned())
    }
}
