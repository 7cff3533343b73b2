//! Delayed shutdown through the host's `shutdown` command.
//!
//! Windows: `shutdown /s|/r /t N /c msg`, cancelled with `/a`.
//! Unix: `shutdown -P|-r +M msg`, cancelled with `-c`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local};

use autopower_core::{AutoPowerError, PendingShutdown, Result, ShutdownAction, ShutdownCommand};

use crate::ledger::{LedgerEntry, ShutdownLedger};
use crate::runner::{CommandOutput, CommandRunner, classify_failure};

const SHUTDOWN: &str = "shutdown";
/// ERROR_NO_SHUTDOWN_IN_PROGRESS
const WIN_NOTHING_PENDING: i32 = 1116;
/// ERROR_SHUTDOWN_IS_SCHEDULED
const WIN_ALREADY_SCHEDULED: i32 = 1190;
const WIN_MAX_DELAY_SECS: u64 = 315_360_000;
const WIN_MAX_MESSAGE: usize = 512;
const SYSTEMD_SCHEDULE: &str = "/run/systemd/shutdown/scheduled";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Windows,
    Unix,
}

impl Flavor {
    pub fn host() -> Self {
        if cfg!(windows) { Flavor::Windows } else { Flavor::Unix }
    }
}

pub struct SystemShutdown {
    runner: Arc<dyn CommandRunner>,
    flavor: Flavor,
    ledger: ShutdownLedger,
    schedule_file: PathBuf,
}

impl SystemShutdown {
    pub fn new(runner: Arc<dyn CommandRunner>, flavor: Flavor, data_dir: &Path) -> Self {
        Self {
            runner,
            flavor,
            ledger: ShutdownLedger::new(data_dir),
            schedule_file: PathBuf::from(SYSTEMD_SCHEDULE),
        }
    }

    /// Read systemd's schedule from somewhere else.
    pub fn with_schedule_file(mut self, path: &Path) -> Self {
        self.schedule_file = path.to_path_buf();
        self
    }

    async fn shutdown(&self, args: Vec<String>) -> Result<CommandOutput> {
        self.runner.run(SHUTDOWN, &args).await
    }

    fn arm_args(&self, delay_secs: u64, action: ShutdownAction, message: &str) -> Vec<String> {
        match self.flavor {
            Flavor::Windows => {
                let flag = match action {
                    ShutdownAction::PowerOff => "/s",
                    ShutdownAction::Reboot => "/r",
                };
                let mut args = vec![
                    flag.to_string(),
                    "/t".to_string(),
                    delay_secs.to_string(),
                ];
                if !message.is_empty() {
                    args.push("/c".to_string());
                    args.push(message.chars().take(WIN_MAX_MESSAGE).collect());
                }
                args
            }
            Flavor::Unix => {
                let flag = match action {
                    ShutdownAction::PowerOff => "-P",
                    ShutdownAction::Reboot => "-r",
                };
                let when = if delay_secs == 0 {
                    "now".to_string()
                } else {
                    format!("+{}", delay_secs.div_ceil(60))
                };
                let mut args = vec![flag.to_string(), when];
                if !message.is_empty() {
                    args.push(message.to_string());
                }
                args
            }
        }
    }

    /// `/a` on Windows: `Ok(true)` if something was cancelled.
    async fn abort_windows(&self) -> Result<bool> {
        let out = self.shutdown(vec!["/a".into()]).await?;
        let was_pending = match out.code {
            0 => true,
            WIN_NOTHING_PENDING => false,
            // The countdown may still be live; keep its ledger entry.
            _ => return Err(classify_failure(SHUTDOWN, &out)),
        };
        if let Err(e) = self.ledger.clear() {
            tracing::warn!("⚠️ Could not clear shutdown ledger: {e}");
        }
        Ok(was_pending)
    }

    /// Parse systemd's `USEC=`/`MODE=` schedule file.
    fn read_systemd_schedule(&self) -> PendingShutdown {
        let content = match std::fs::read_to_string(&self.schedule_file) {
            Ok(c) => c,
            Err(_) => {
                let systemd_present = self
                    .schedule_file
                    .parent()
                    .and_then(Path::parent)
                    .is_some_and(Path::exists);
                return if systemd_present {
                    PendingShutdown::NotPending
                } else {
                    PendingShutdown::Unknown
                };
            }
        };

        let mut deadline = None;
        let mut action = None;
        for line in content.lines() {
            if let Some(usec) = line.strip_prefix("USEC=") {
                deadline = usec.trim().parse::<i64>().ok().and_then(|us| {
                    let nanos = (us.rem_euclid(1_000_000) * 1000) as u32;
                    DateTime::from_timestamp(us.div_euclid(1_000_000), nanos)
                        .map(|utc| utc.with_timezone(&Local).naive_local())
                });
            } else if let Some(mode) = line.strip_prefix("MODE=") {
                action = match mode.trim() {
                    "reboot" | "kexec" => Some(ShutdownAction::Reboot),
                    "poweroff" | "halt" => Some(ShutdownAction::PowerOff),
                    _ => None,
                };
            }
        }
        PendingShutdown::Pending { deadline, action }
    }
}

#[async_trait]
impl ShutdownCommand for SystemShutdown {
    async fn arm(&self, delay_secs: u64, action: ShutdownAction, message: &str) -> Result<()> {
        if self.flavor == Flavor::Windows && delay_secs > WIN_MAX_DELAY_SECS {
            return Err(AutoPowerError::failed(format!(
                "shutdown delay of {delay_secs}s exceeds the Windows limit of {WIN_MAX_DELAY_SECS}s"
            )));
        }
        let args = self.arm_args(delay_secs, action, message);
        let mut out = self.shutdown(args.clone()).await?;

        if self.flavor == Flavor::Windows && out.code == WIN_ALREADY_SCHEDULED {
            tracing::info!("🔁 Replacing the shutdown already scheduled");
            self.abort_windows().await?;
            out = self.shutdown(args).await?;
        }
        if !out.success() {
            return Err(classify_failure(SHUTDOWN, &out));
        }

        tracing::info!("⏻ Armed {action} in {delay_secs}s");
        if self.flavor == Flavor::Windows {
            // The countdown is live either way; status just degrades to Unknown.
            if let Err(e) = self.ledger.save(&LedgerEntry::new(delay_secs, action)) {
                tracing::warn!("⚠️ Could not record pending shutdown: {e}");
            }
        }
        Ok(())
    }

    async fn cancel(&self) -> Result<()> {
        match self.flavor {
            Flavor::Windows => {
                if self.abort_windows().await? {
                    tracing::info!("🛑 Pending shutdown cancelled");
                }
                Ok(())
            }
            Flavor::Unix => {
                let out = self.shutdown(vec!["-c".into()]).await?;
                if out.success() {
                    Ok(())
                } else {
                    Err(classify_failure(SHUTDOWN, &out))
                }
            }
        }
    }

    async fn status(&self) -> Result<PendingShutdown> {
        Ok(match self.flavor {
            Flavor::Windows => self.ledger.status_at(Local::now().naive_local()),
            Flavor::Unix => self.read_systemd_schedule(),
        })
    }

    async fn probe_by_cancel(&self) -> Result<bool> {
        match self.flavor {
            Flavor::Windows => self.abort_windows().await,
            Flavor::Unix => {
                let was_pending = matches!(self.read_systemd_schedule(), PendingShutdown::Pending { .. });
                self.cancel().await?;
                Ok(was_pending)
            }
        }
    }
}
