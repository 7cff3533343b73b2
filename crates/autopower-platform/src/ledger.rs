//! Shutdown ledger: remembers the countdown AutoPower armed.
//!
//! Windows offers no way to read a pending `shutdown /t` without cancelling
//! it, so the adapter records what it armed and answers status from here.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use autopower_core::{PendingShutdown, Result, ShutdownAction};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub deadline: NaiveDateTime,
    pub action: ShutdownAction,
    pub armed_at: NaiveDateTime,
}

impl LedgerEntry {
    pub fn new(delay_secs: u64, action: ShutdownAction) -> Self {
        let armed_at = Local::now().naive_local();
        Self {
            deadline: armed_at + chrono::Duration::seconds(delay_secs as i64),
            action,
            armed_at,
        }
    }
}

pub struct ShutdownLedger {
    file: PathBuf,
}

impl ShutdownLedger {
    pub fn new(dir: &Path) -> Self {
        Self {
            file: dir.join("pending_shutdown.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file
    }

    pub fn save(&self, entry: &LedgerEntry) -> Result<()> {
        if let Some(parent) = self.file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.file, serde_json::to_string_pretty(entry)?)?;
        tracing::debug!("💾 Recorded pending {} at {}", entry.action, entry.deadline);
        Ok(())
    }

    /// The recorded entry, if any. A corrupt file reads as absent.
    pub fn load(&self) -> Option<LedgerEntry> {
        let json = std::fs::read_to_string(&self.file).ok()?;
        serde_json::from_str(&json)
            .map_err(|e| tracing::warn!("⚠️ Ignoring unreadable {}: {e}", self.file.display()))
            .ok()
    }

    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.file) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Status as of `now`. A deadline in the past means the countdown ran
    /// out or was cleared outside AutoPower.
    pub fn status_at(&self, now: NaiveDateTime) -> PendingShutdown {
        match self.load() {
            Some(entry) if entry.deadline > now => PendingShutdown::Pending {
                deadline: Some(entry.deadline),
                action: Some(entry.action),
            },
            Some(_) => PendingShutdown::NotPending,
            None => PendingShutdown::Unknown,
        }
    }
}
