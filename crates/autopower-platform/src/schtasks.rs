//! Windows Task Scheduler repository backed by `schtasks.exe`.
//!
//! Every task lives under one folder (`\AutoPower\Boot`, …). Registration
//! goes through an XML document so wake and battery settings survive.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;

use autopower_core::{AutoPowerError, Result, TaskDefinition, TaskName, TaskRepository};

use crate::runner::{CommandRunner, classify_failure};
use crate::taskxml;

const SCHTASKS: &str = "schtasks";

pub struct SchtasksRepository {
    runner: Arc<dyn CommandRunner>,
    folder: String,
}

impl SchtasksRepository {
    pub fn new(runner: Arc<dyn CommandRunner>, folder: &str) -> Self {
        Self {
            runner,
            folder: folder.trim_matches('\\').to_string(),
        }
    }

    /// Full registered path, e.g. `\AutoPower\StageBoot`.
    pub fn task_path(&self, name: TaskName) -> String {
        if self.folder.is_empty() {
            format!("\\{name}")
        } else {
            format!("\\{}\\{name}", self.folder)
        }
    }

    async fn schtasks(&self, args: &[&str]) -> Result<crate::runner::CommandOutput> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.runner.run(SCHTASKS, &args).await
    }

    async fn delete(&self, name: TaskName) -> Result<bool> {
        let path = self.task_path(name);
        let out = self.schtasks(&["/Delete", "/TN", &path, "/F"]).await?;
        if out.success() {
            tracing::debug!("🗑️ Deleted task {path}");
            Ok(true)
        } else if out.is_not_found() {
            Ok(false)
        } else {
            Err(classify_failure(SCHTASKS, &out))
        }
    }

    /// Write the UTF-16 document to a temp file that lives until registration ends.
    fn write_definition(&self, def: &TaskDefinition) -> Result<tempfile::NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix("autopower-")
            .suffix(".xml")
            .tempfile()?;
        file.write_all(&taskxml::to_utf16_bytes(&taskxml::render(def)))?;
        file.flush()?;
        Ok(file)
    }
}

#[async_trait]
impl TaskRepository for SchtasksRepository {
    fn name(&self) -> &str {
        "schtasks"
    }

    async fn upsert(&self, name: TaskName, definition: &TaskDefinition) -> Result<()> {
        self.delete(name).await?;

        let file = self.write_definition(definition)?;
        let path = self.task_path(name);
        let xml_path = file.path().to_string_lossy().to_string();
        let out = self
            .schtasks(&["/Create", "/TN", &path, "/XML", &xml_path, "/F"])
            .await?;
        if !out.success() {
            return Err(classify_failure(SCHTASKS, &out));
        }
        tracing::info!(
            "📅 Registered {path} ({} trigger(s), enabled={})",
            definition.triggers.len(),
            definition.enabled
        );
        Ok(())
    }

    async fn remove(&self, name: TaskName) -> Result<()> {
        if !self.delete(name).await? {
            tracing::debug!("Task {} not registered; nothing to remove", self.task_path(name));
        }
        Ok(())
    }

    async fn find(&self, name: TaskName) -> Result<Option<TaskDefinition>> {
        let path = self.task_path(name);
        let out = self.schtasks(&["/Query", "/TN", &path, "/XML"]).await?;
        if !out.success() {
            return if out.is_not_found() {
                Ok(None)
            } else {
                Err(classify_failure(SCHTASKS, &out))
            };
        }
        taskxml::parse(name, &out.stdout)
            .map(Some)
            .map_err(|e| AutoPowerError::failed(format!("{path}: {e}")))
    }
}
