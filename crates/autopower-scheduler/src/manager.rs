//! Power task scheduling manager: validates requests, builds task
//! definitions, replaces them idempotently and answers status queries.
//!
//! Boot and stage schedules are persisted in the external task store under
//! reserved names. A timed shutdown is a live OS countdown instead and never
//! touches the store.

use std::sync::Arc;

use chrono::{Local, NaiveDateTime, NaiveTime};

use autopower_core::{
    AutoPowerError, Confirm, DaySet, PendingShutdown, Result, ScheduleRow, SchedulerConfig,
    ShutdownAction, ShutdownCommand, TaskAction, TaskDefinition, TaskName, TaskRepository,
};

use crate::locks::{TaskLockStats, TaskLocks};
use crate::notify::NotifyRouter;
use crate::summary;
use crate::trigger::{self, StageRole};

/// Outcome of a manager operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub message: String,
    /// Whether anything was written to the store or the OS.
    pub changed: bool,
}

impl Report {
    fn done(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            changed: true,
        }
    }

    fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            changed: false,
        }
    }
}

/// Whether a shutdown countdown is armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingStatus {
    Pending,
    NotPending,
}

/// How to find out whether a shutdown is pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeMode {
    /// Non-destructive adapter status.
    #[default]
    ReadOnly,
    /// Issue a cancel and inspect the answer. Cancels a pending shutdown.
    CancelProbe,
}

type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// The scheduling manager.
pub struct PowerScheduler {
    repo: Arc<dyn TaskRepository>,
    shutdown: Arc<dyn ShutdownCommand>,
    config: SchedulerConfig,
    locks: TaskLocks,
    pub router: NotifyRouter,
    clock: Clock,
}

impl PowerScheduler {
    pub fn new(
        repo: Arc<dyn TaskRepository>,
        shutdown: Arc<dyn ShutdownCommand>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            repo,
            shutdown,
            config,
            locks: TaskLocks::new(),
            router: NotifyRouter::new(),
            clock: Arc::new(|| Local::now().naive_local()),
        }
    }

    /// Replace the local wall clock.
    pub fn with_clock<F>(mut self, f: F) -> Self
    where
        F: Fn() -> NaiveDateTime + Send + Sync + 'static,
    {
        self.clock = Arc::new(f);
        self
    }

    pub fn with_router(mut self, router: NotifyRouter) -> Self {
        self.router = router;
        self
    }

    fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    fn notify(&self, title: &str, body: &str) {
        if self.config.show_notifications {
            self.router.send(title, body);
        }
    }

    // ─── Boot ─────────────────────────────────────────────────

    /// Register (or replace) the boot task.
    ///
    /// `enabled == false` writes nothing and leaves any registered boot task
    /// alone; use [`Self::remove_boot_task`] to clear it.
    pub async fn set_boot_task(
        &self,
        at: NaiveDateTime,
        enabled: bool,
        repeat_daily: bool,
    ) -> Result<Report> {
        if !repeat_daily && at <= self.now() {
            return Err(AutoPowerError::validation("boot time must be in the future"));
        }

        let mut slot = self.locks.lock(TaskName::Boot).await;
        if !enabled {
            tracing::info!("⏸️ Boot task disabled; store left unchanged");
            return Ok(Report::info("Boot task disabled; nothing registered"));
        }

        let definition = TaskDefinition::new(TaskName::Boot, "AutoPower boot task", TaskAction::Resume)
            .waking()
            .with_triggers(vec![trigger::boot_trigger(at, repeat_daily)]);
        self.repo
            .upsert(TaskName::Boot, &definition)
            .await
            .inspect_err(|e| tracing::warn!("⚠️ Failed to register boot task: {e}"))?;
        slot.record("set");

        let mode = if repeat_daily { "daily" } else { "once" };
        let message = format!("Boot scheduled for {} ({mode})", at.format("%Y-%m-%d %H:%M"));
        tracing::info!("📅 {message}");
        self.notify("Boot task", &message);
        Ok(Report::done(message))
    }

    /// Delete the boot task. Succeeds when there is none.
    pub async fn remove_boot_task(&self) -> Result<Report> {
        let mut slot = self.locks.lock(TaskName::Boot).await;
        self.repo.remove(TaskName::Boot).await?;
        slot.record("remove");
        tracing::info!("🗑️ Boot task removed");
        self.notify("Boot task", "Boot task removed");
        Ok(Report::done("Boot task removed"))
    }

    // ─── Shutdown ─────────────────────────────────────────────

    /// Arm a one-off shutdown at `at`, or cancel any pending one when disabled.
    ///
    /// This is a countdown from now inside the OS, not a persisted task; it
    /// does not survive a restart.
    pub async fn set_shutdown_task(&self, at: NaiveDateTime, enabled: bool) -> Result<Report> {
        if (at - self.now()).num_seconds() <= 0 {
            return Err(AutoPowerError::validation("shutdown time must be in the future"));
        }

        if !enabled {
            return self.cancel_shutdown().await;
        }

        let mut slot = self.locks.lock(TaskName::Shutdown).await;
        // Delay counts from when the lock is held, not from the request.
        let delay_secs = (at - self.now()).num_seconds();
        if delay_secs <= 0 {
            return Err(AutoPowerError::validation("shutdown time must be in the future"));
        }
        let when = at.format("%Y-%m-%d %H:%M").to_string();
        let warning = self.config.shutdown_message.replace("{time}", &when);
        self.shutdown
            .arm(delay_secs as u64, ShutdownAction::PowerOff, &warning)
            .await
            .inspect_err(|e| tracing::warn!("⚠️ Failed to arm shutdown: {e}"))?;
        slot.record("arm");

        let message = format!("Shutdown scheduled for {when} (in {delay_secs}s)");
        tracing::info!("⏻ {message}");
        self.notify("Shutdown", &message);
        Ok(Report::done(message))
    }

    /// Clear any pending shutdown. Nothing pending is still success.
    pub async fn cancel_shutdown(&self) -> Result<Report> {
        let mut slot = self.locks.lock(TaskName::Shutdown).await;
        self.shutdown.cancel().await?;
        slot.record("cancel");
        tracing::info!("🛑 Pending shutdown cancelled");
        self.notify("Shutdown", "Pending shutdown cancelled");
        Ok(Report::done("Pending shutdown cancelled"))
    }

    /// Power off immediately, after confirmation.
    pub async fn shutdown_now(&self, confirm: &dyn Confirm) -> Result<Report> {
        self.immediate(
            ShutdownAction::PowerOff,
            confirm,
            "Power off now? Unsaved work will be lost.",
        )
        .await
    }

    /// Restart immediately, after confirmation.
    pub async fn restart_now(&self, confirm: &dyn Confirm) -> Result<Report> {
        self.immediate(
            ShutdownAction::Reboot,
            confirm,
            "Restart now? Unsaved work will be lost.",
        )
        .await
    }

    async fn immediate(
        &self,
        action: ShutdownAction,
        confirm: &dyn Confirm,
        prompt: &str,
    ) -> Result<Report> {
        if !confirm.confirm(prompt) {
            tracing::info!("↩️ Immediate {action} declined");
            return Ok(Report::info(format!("Immediate {action} not confirmed")));
        }
        let mut slot = self.locks.lock(TaskName::Shutdown).await;
        self.shutdown.arm(0, action, "AutoPower").await?;
        slot.record("now");
        tracing::info!("⏻ Immediate {action} issued");
        Ok(Report::done(format!("Immediate {action} issued")))
    }

    // ─── Stage ────────────────────────────────────────────────

    /// Register the weekly boot/shutdown pair.
    ///
    /// If StageShutdown fails after StageBoot was registered, StageBoot stays;
    /// calling again regenerates both identically.
    pub async fn set_stage_task(
        &self,
        days: &DaySet,
        boot_at: NaiveTime,
        shutdown_at: NaiveTime,
        enabled: bool,
    ) -> Result<Report> {
        if days.is_empty() {
            return Err(AutoPowerError::validation("select at least one weekday"));
        }
        if boot_at >= shutdown_at {
            return Err(AutoPowerError::validation(
                "shutdown time must be later than boot time",
            ));
        }

        let (mut boot_slot, mut shutdown_slot) = self.locks.lock_stage().await;
        if !enabled {
            tracing::info!("⏸️ Stage task disabled; store left unchanged");
            return Ok(Report::info("Stage task disabled; nothing registered"));
        }

        let today = self.now().date();
        let boot = TaskDefinition::new(
            TaskName::StageBoot,
            "AutoPower stage boot task",
            TaskAction::Resume,
        )
        .waking()
        .with_triggers(trigger::build_stage_triggers(days, boot_at, StageRole::Boot, today));
        let shutdown = TaskDefinition::new(
            TaskName::StageShutdown,
            "AutoPower stage shutdown task",
            TaskAction::PowerOff,
        )
        .with_triggers(trigger::build_stage_triggers(
            days,
            shutdown_at,
            StageRole::Shutdown,
            today,
        ));

        self.repo
            .upsert(TaskName::StageBoot, &boot)
            .await
            .inspect_err(|e| tracing::warn!("⚠️ Failed to register stage boot task: {e}"))?;
        boot_slot.record("set");
        self.repo.upsert(TaskName::StageShutdown, &shutdown).await.inspect_err(|e| {
            tracing::warn!("⚠️ Stage boot registered but stage shutdown failed: {e}")
        })?;
        shutdown_slot.record("set");

        let message = format!(
            "Stage task set: boot {}, shutdown {}, on {}",
            boot_at.format("%H:%M"),
            shutdown_at.format("%H:%M"),
            days.names()
        );
        tracing::info!("📅 {message}");
        self.notify("Stage task", &message);
        Ok(Report::done(message))
    }

    /// Delete both stage tasks. Succeeds when neither exists.
    pub async fn remove_stage_task(&self) -> Result<Report> {
        let (mut boot_slot, mut shutdown_slot) = self.locks.lock_stage().await;
        self.repo.remove(TaskName::StageBoot).await?;
        boot_slot.record("remove");
        self.repo.remove(TaskName::StageShutdown).await?;
        shutdown_slot.record("remove");
        tracing::info!("🗑️ Stage tasks removed");
        self.notify("Stage task", "Stage tasks removed");
        Ok(Report::done("Stage tasks removed"))
    }

    // ─── Status ───────────────────────────────────────────────

    /// Display rows for StageBoot, StageShutdown and Boot.
    ///
    /// The shutdown countdown is not a stored task and never appears here.
    pub async fn list_schedule_summary(&self) -> Result<Vec<ScheduleRow>> {
        let mut tasks = Vec::with_capacity(3);
        for name in [TaskName::StageBoot, TaskName::StageShutdown, TaskName::Boot] {
            tasks.push(self.repo.find(name).await?);
        }
        Ok(summary::summarize(&tasks, self.config.empty_placeholder))
    }

    /// Whether a shutdown countdown is armed.
    ///
    /// [`ProbeMode::CancelProbe`] cancels the countdown it detects; only use it
    /// when the adapter cannot answer read-only.
    pub async fn query_pending_shutdown_status(&self, mode: ProbeMode) -> Result<PendingStatus> {
        match mode {
            ProbeMode::ReadOnly => match self.shutdown.status().await? {
                PendingShutdown::Pending { .. } => Ok(PendingStatus::Pending),
                PendingShutdown::NotPending => Ok(PendingStatus::NotPending),
                PendingShutdown::Unknown => {
                    tracing::warn!("⚠️ Shutdown adapter has no read-only status; reporting not pending");
                    Ok(PendingStatus::NotPending)
                }
            },
            ProbeMode::CancelProbe => {
                let mut slot = self.locks.lock(TaskName::Shutdown).await;
                let was_pending = self.shutdown.probe_by_cancel().await?;
                slot.record("probe");
                if was_pending {
                    tracing::warn!("🛑 Cancel probe found and cancelled a pending shutdown");
                    Ok(PendingStatus::Pending)
                } else {
                    Ok(PendingStatus::NotPending)
                }
            }
        }
    }

    /// Raw read-only shutdown status, including the deadline when known.
    pub async fn pending_shutdown(&self) -> Result<PendingShutdown> {
        self.shutdown.status().await
    }

    /// Per-name operation counters.
    pub async fn lock_stats(&self) -> Vec<TaskLockStats> {
        self.locks.stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use autopower_core::{FixedAnswer, TriggerRecord};
    use chrono::{Duration, NaiveDate, Weekday};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingRepo {
        tasks: Mutex<HashMap<TaskName, TaskDefinition>>,
        calls: Mutex<Vec<String>>,
        fail_upsert: Mutex<Option<(TaskName, bool)>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl RecordingRepo {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn fail_on(&self, name: TaskName, permission: bool) {
            *self.fail_upsert.lock().unwrap() = Some((name, permission));
        }

        fn get(&self, name: TaskName) -> Option<TaskDefinition> {
            self.tasks.lock().unwrap().get(&name).cloned()
        }

        async fn enter(&self) {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        fn leave(&self) {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl TaskRepository for RecordingRepo {
        fn name(&self) -> &str {
            "recording"
        }

        async fn upsert(&self, name: TaskName, definition: &TaskDefinition) -> Result<()> {
            self.calls.lock().unwrap().push(format!("upsert:{name}"));
            self.enter().await;
            self.tasks.lock().unwrap().remove(&name);
            let fail = *self.fail_upsert.lock().unwrap();
            let result = match fail {
                Some((n, true)) if n == name => {
                    Err(AutoPowerError::PermissionDenied("Access is denied.".into()))
                }
                Some((n, false)) if n == name => Err(AutoPowerError::failed("disk full")),
                _ => {
                    self.tasks.lock().unwrap().insert(name, definition.clone());
                    Ok(())
                }
            };
            self.leave();
            result
        }

        async fn remove(&self, name: TaskName) -> Result<()> {
            self.calls.lock().unwrap().push(format!("remove:{name}"));
            self.enter().await;
            self.tasks.lock().unwrap().remove(&name);
            self.leave();
            Ok(())
        }

        async fn find(&self, name: TaskName) -> Result<Option<TaskDefinition>> {
            Ok(self.get(name))
        }
    }

    #[derive(Default)]
    struct FakeShutdown {
        armed: Mutex<Option<(u64, ShutdownAction, String)>>,
        arms: AtomicUsize,
        cancels: AtomicUsize,
    }

    #[async_trait]
    impl ShutdownCommand for FakeShutdown {
        async fn arm(&self, delay_secs: u64, action: ShutdownAction, message: &str) -> Result<()> {
            self.arms.fetch_add(1, Ordering::SeqCst);
            *self.armed.lock().unwrap() = Some((delay_secs, action, message.to_string()));
            Ok(())
        }

        async fn cancel(&self) -> Result<()> {
            self.cancels.fetch_add(1, Ordering::SeqCst);
            *self.armed.lock().unwrap() = None;
            Ok(())
        }

        async fn status(&self) -> Result<PendingShutdown> {
            Ok(match &*self.armed.lock().unwrap() {
                Some((_, action, _)) => PendingShutdown::Pending {
                    deadline: None,
                    action: Some(*action),
                },
                None => PendingShutdown::NotPending,
            })
        }

        async fn probe_by_cancel(&self) -> Result<bool> {
            Ok(self.armed.lock().unwrap().take().is_some())
        }
    }

    /// Shutdown adapter without a read-only status.
    struct BlindShutdown;

    #[async_trait]
    impl ShutdownCommand for BlindShutdown {
        async fn arm(&self, _: u64, _: ShutdownAction, _: &str) -> Result<()> {
            Ok(())
        }

        async fn cancel(&self) -> Result<()> {
            Ok(())
        }

        async fn probe_by_cancel(&self) -> Result<bool> {
            Ok(false)
        }
    }

    fn now() -> NaiveDateTime {
        // Sunday noon.
        NaiveDate::from_ymd_opt(2026, 10, 18)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn setup() -> (PowerScheduler, Arc<RecordingRepo>, Arc<FakeShutdown>) {
        let repo = Arc::new(RecordingRepo::default());
        let shutdown = Arc::new(FakeShutdown::default());
        let sched = PowerScheduler::new(repo.clone(), shutdown.clone(), SchedulerConfig::default())
            .with_clock(now);
        (sched, repo, shutdown)
    }

    #[tokio::test]
    async fn test_boot_in_past_rejected_without_upsert() {
        let (sched, repo, _) = setup();
        let err = sched
            .set_boot_task(now() - Duration::minutes(1), true, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AutoPowerError::Validation(_)));
        assert!(repo.calls().is_empty());
    }

    #[tokio::test]
    async fn test_boot_now_rejected() {
        let (sched, repo, _) = setup();
        assert!(sched.set_boot_task(now(), true, false).await.is_err());
        assert!(repo.calls().is_empty());
    }

    #[tokio::test]
    async fn test_daily_boot_in_past_allowed() {
        let (sched, repo, _) = setup();
        let at = now() - Duration::hours(5);
        sched.set_boot_task(at, true, true).await.unwrap();
        let def = repo.get(TaskName::Boot).unwrap();
        assert_eq!(def.triggers, vec![TriggerRecord::Daily { at }]);
    }

    #[tokio::test]
    async fn test_boot_definition_shape() {
        let (sched, repo, _) = setup();
        let at = now() + Duration::hours(20);
        let report = sched.set_boot_task(at, true, false).await.unwrap();
        assert!(report.changed);
        assert!(report.message.contains("2026-10-19 08:00"));
        assert!(report.message.contains("once"));

        let def = repo.get(TaskName::Boot).unwrap();
        assert_eq!(def.triggers, vec![TriggerRecord::OneShot { at }]);
        assert!(def.wake_capable);
        assert!(!def.battery_policy.disallow_start_on_batteries);
        assert!(!def.battery_policy.stop_if_going_on_batteries);
        assert_eq!(def.action, TaskAction::Resume);
    }

    #[tokio::test]
    async fn test_boot_set_twice_leaves_one_task() {
        let (sched, repo, _) = setup();
        let at = now() + Duration::hours(2);
        sched.set_boot_task(at, true, false).await.unwrap();
        let first = repo.get(TaskName::Boot).unwrap();
        sched.set_boot_task(at, true, false).await.unwrap();

        assert_eq!(repo.tasks.lock().unwrap().len(), 1);
        assert_eq!(repo.get(TaskName::Boot).unwrap().triggers, first.triggers);
    }

    #[tokio::test]
    async fn test_boot_disabled_leaves_existing_task() {
        let (sched, repo, _) = setup();
        let at = now() + Duration::hours(2);
        sched.set_boot_task(at, true, true).await.unwrap();
        let report = sched
            .set_boot_task(at + Duration::hours(1), false, false)
            .await
            .unwrap();
        assert!(!report.changed);
        assert_eq!(repo.calls(), vec!["upsert:Boot"]);
        assert!(repo.get(TaskName::Boot).is_some());
    }

    #[tokio::test]
    async fn test_boot_permission_denied_passes_through() {
        let (sched, repo, _) = setup();
        repo.fail_on(TaskName::Boot, true);
        let err = sched
            .set_boot_task(now() + Duration::hours(1), true, false)
            .await
            .unwrap_err();
        assert!(err.needs_elevation());
    }

    #[tokio::test]
    async fn test_remove_boot_when_absent() {
        let (sched, repo, _) = setup();
        let report = sched.remove_boot_task().await.unwrap();
        assert!(report.changed);
        assert_eq!(repo.calls(), vec!["remove:Boot"]);
    }

    #[tokio::test]
    async fn test_shutdown_arms_with_delay() {
        let (sched, repo, shutdown) = setup();
        let report = sched
            .set_shutdown_task(now() + Duration::seconds(90), true)
            .await
            .unwrap();
        assert!(report.message.contains("90s"));
        let (delay, action, message) = shutdown.armed.lock().unwrap().clone().unwrap();
        assert!((89..=91).contains(&delay));
        assert_eq!(action, ShutdownAction::PowerOff);
        assert!(message.contains("2026-10-18 12:01"));
        assert!(repo.calls().is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_delay_measured_after_lock_wait() {
        use std::sync::atomic::AtomicI64;

        let offset = Arc::new(AtomicI64::new(0));
        let clock_offset = offset.clone();
        let shutdown = Arc::new(FakeShutdown::default());
        let sched = Arc::new(
            PowerScheduler::new(
                Arc::new(RecordingRepo::default()),
                shutdown.clone(),
                SchedulerConfig::default(),
            )
            .with_clock(move || now() + Duration::seconds(clock_offset.load(Ordering::SeqCst))),
        );

        let guard = sched.locks.lock(TaskName::Shutdown).await;
        let task = {
            let sched = sched.clone();
            tokio::spawn(async move {
                sched
                    .set_shutdown_task(now() + Duration::seconds(90), true)
                    .await
            })
        };
        tokio::task::yield_now().await;
        offset.store(30, Ordering::SeqCst);
        drop(guard);

        task.await.unwrap().unwrap();
        let (delay, _, _) = shutdown.armed.lock().unwrap().clone().unwrap();
        assert_eq!(delay, 60);
    }

    #[tokio::test]
    async fn test_shutdown_subsecond_delay_rejected() {
        let (sched, _, shutdown) = setup();
        let err = sched
            .set_shutdown_task(now() + Duration::milliseconds(400), true)
            .await
            .unwrap_err();
        assert!(matches!(err, AutoPowerError::Validation(_)));
        assert_eq!(shutdown.arms.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shutdown_in_past_rejected() {
        let (sched, _, shutdown) = setup();
        assert!(sched.set_shutdown_task(now(), false).await.is_err());
        assert_eq!(shutdown.cancels.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shutdown_disabled_cancels() {
        let (sched, _, shutdown) = setup();
        sched
            .set_shutdown_task(now() + Duration::minutes(10), true)
            .await
            .unwrap();
        sched
            .set_shutdown_task(now() + Duration::minutes(10), false)
            .await
            .unwrap();
        assert_eq!(shutdown.cancels.load(Ordering::SeqCst), 1);
        assert!(shutdown.armed.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancel_when_nothing_pending() {
        let (sched, _, _) = setup();
        assert!(sched.cancel_shutdown().await.is_ok());
    }

    #[tokio::test]
    async fn test_immediate_requires_confirmation() {
        let (sched, _, shutdown) = setup();
        let report = sched.shutdown_now(&FixedAnswer(false)).await.unwrap();
        assert!(!report.changed);
        assert_eq!(shutdown.arms.load(Ordering::SeqCst), 0);

        sched.restart_now(&FixedAnswer(true)).await.unwrap();
        let (delay, action, _) = shutdown.armed.lock().unwrap().clone().unwrap();
        assert_eq!(delay, 0);
        assert_eq!(action, ShutdownAction::Reboot);

        sched.shutdown_now(&FixedAnswer(true)).await.unwrap();
        let (_, action, _) = shutdown.armed.lock().unwrap().clone().unwrap();
        assert_eq!(action, ShutdownAction::PowerOff);
    }

    #[tokio::test]
    async fn test_stage_equal_or_inverted_times_rejected() {
        let (sched, repo, _) = setup();
        let days: DaySet = "mon".parse().unwrap();
        assert!(matches!(
            sched.set_stage_task(&days, hm(8, 0), hm(8, 0), true).await,
            Err(AutoPowerError::Validation(_))
        ));
        assert!(matches!(
            sched.set_stage_task(&days, hm(18, 1), hm(18, 0), true).await,
            Err(AutoPowerError::Validation(_))
        ));
        assert!(repo.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stage_empty_days_rejected() {
        let (sched, repo, _) = setup();
        let err = sched
            .set_stage_task(&DaySet::new(), hm(8, 0), hm(18, 0), true)
            .await
            .unwrap_err();
        assert!(matches!(err, AutoPowerError::Validation(_)));
        assert!(repo.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stage_scenario_and_summary() {
        let (sched, repo, _) = setup();
        let days: DaySet = vec![Weekday::Fri, Weekday::Mon, Weekday::Wed].into();
        let report = sched
            .set_stage_task(&days, hm(8, 0), hm(18, 0), true)
            .await
            .unwrap();
        assert!(report.message.contains("boot 08:00"));
        assert!(report.message.contains("shutdown 18:00"));
        assert!(report.message.contains("Monday, Wednesday, Friday"));

        let boot = repo.get(TaskName::StageBoot).unwrap();
        let off = repo.get(TaskName::StageShutdown).unwrap();
        assert_eq!(boot.triggers.len(), 3);
        assert_eq!(off.triggers.len(), 3);
        assert!(boot.wake_capable);
        assert_eq!(off.action, TaskAction::PowerOff);
        assert!(boot.triggers.iter().all(|t| t.start_boundary().time() == hm(8, 0)));
        assert!(off.triggers.iter().all(|t| t.start_boundary().time() == hm(18, 0)));
        // Seeded from tomorrow (Monday 2026-10-19).
        assert_eq!(
            boot.triggers[0].start_boundary().date(),
            NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
        );

        let rows = sched.list_schedule_summary().await.unwrap();
        assert_eq!(rows.len(), 6);
        let recurrences: Vec<&str> = rows.iter().map(|r| r.recurrence.as_str()).collect();
        assert_eq!(
            recurrences,
            vec![
                "Weekly on Monday",
                "Weekly on Wednesday",
                "Weekly on Friday",
                "Weekly on Monday",
                "Weekly on Wednesday",
                "Weekly on Friday",
            ]
        );
        assert!(rows[..3].iter().all(|r| r.label == "Stage boot" && r.time == "08:00"));
        assert!(rows[3..].iter().all(|r| r.label == "Stage shutdown" && r.time == "18:00"));
    }

    #[tokio::test]
    async fn test_stage_second_half_failure_keeps_first() {
        let (sched, repo, _) = setup();
        repo.fail_on(TaskName::StageShutdown, false);
        let days: DaySet = "tue".parse().unwrap();
        let err = sched
            .set_stage_task(&days, hm(7, 0), hm(19, 0), true)
            .await
            .unwrap_err();
        assert!(matches!(err, AutoPowerError::OperationFailed(_)));
        assert!(repo.get(TaskName::StageBoot).is_some());
        assert!(repo.get(TaskName::StageShutdown).is_none());
    }

    #[tokio::test]
    async fn test_stage_disabled_writes_nothing() {
        let (sched, repo, _) = setup();
        let days: DaySet = "sat".parse().unwrap();
        let report = sched
            .set_stage_task(&days, hm(9, 0), hm(17, 0), false)
            .await
            .unwrap();
        assert!(!report.changed);
        assert!(repo.calls().is_empty());
    }

    #[tokio::test]
    async fn test_remove_stage_removes_both() {
        let (sched, repo, _) = setup();
        let days: DaySet = "sat".parse().unwrap();
        sched
            .set_stage_task(&days, hm(9, 0), hm(17, 0), true)
            .await
            .unwrap();
        sched.remove_stage_task().await.unwrap();
        assert!(repo.get(TaskName::StageBoot).is_none());
        assert!(repo.get(TaskName::StageShutdown).is_none());
        assert!(sched.remove_stage_task().await.is_ok());
    }

    #[tokio::test]
    async fn test_summary_placeholder_and_shutdown_excluded() {
        let (sched, _, _) = setup();
        sched
            .set_shutdown_task(now() + Duration::hours(1), true)
            .await
            .unwrap();
        let rows = sched.list_schedule_summary().await.unwrap();
        assert_eq!(rows, vec![summary::placeholder_row()]);

        let repo = Arc::new(RecordingRepo::default());
        let config = SchedulerConfig {
            empty_placeholder: false,
            ..SchedulerConfig::default()
        };
        let bare = PowerScheduler::new(repo, Arc::new(FakeShutdown::default()), config);
        assert!(bare.list_schedule_summary().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_read_only_does_not_cancel() {
        let (sched, _, shutdown) = setup();
        sched
            .set_shutdown_task(now() + Duration::hours(1), true)
            .await
            .unwrap();
        let status = sched
            .query_pending_shutdown_status(ProbeMode::ReadOnly)
            .await
            .unwrap();
        assert_eq!(status, PendingStatus::Pending);
        assert!(shutdown.armed.lock().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_status_cancel_probe_cancels() {
        let (sched, _, shutdown) = setup();
        sched
            .set_shutdown_task(now() + Duration::hours(1), true)
            .await
            .unwrap();
        let status = sched
            .query_pending_shutdown_status(ProbeMode::CancelProbe)
            .await
            .unwrap();
        assert_eq!(status, PendingStatus::Pending);
        assert!(shutdown.armed.lock().unwrap().is_none());

        let again = sched
            .query_pending_shutdown_status(ProbeMode::CancelProbe)
            .await
            .unwrap();
        assert_eq!(again, PendingStatus::NotPending);
    }

    #[tokio::test]
    async fn test_status_unknown_reports_not_pending() {
        let sched = PowerScheduler::new(
            Arc::new(RecordingRepo::default()),
            Arc::new(BlindShutdown),
            SchedulerConfig::default(),
        );
        let status = sched
            .query_pending_shutdown_status(ProbeMode::ReadOnly)
            .await
            .unwrap();
        assert_eq!(status, PendingStatus::NotPending);
    }

    #[tokio::test]
    async fn test_notifications_follow_config() {
        let (sched, _, _) = setup();
        sched.remove_boot_task().await.unwrap();
        assert_eq!(sched.router.history().len(), 1);

        let quiet = PowerScheduler::new(
            Arc::new(RecordingRepo::default()),
            Arc::new(FakeShutdown::default()),
            SchedulerConfig {
                show_notifications: false,
                ..SchedulerConfig::default()
            },
        );
        quiet.remove_boot_task().await.unwrap();
        assert!(quiet.router.history().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_name_operations_serialized() {
        let repo = Arc::new(RecordingRepo::default());
        let sched = Arc::new(
            PowerScheduler::new(
                repo.clone(),
                Arc::new(FakeShutdown::default()),
                SchedulerConfig::default(),
            )
            .with_clock(now),
        );

        let mut handles = Vec::new();
        for i in 0..8 {
            let sched = sched.clone();
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    sched
                        .set_boot_task(now() + Duration::hours(1), true, false)
                        .await
                        .map(|_| ())
                } else {
                    sched.remove_boot_task().await.map(|_| ())
                }
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(repo.max_in_flight.load(Ordering::SeqCst), 1);
        let stats = sched.lock_stats().await;
        assert_eq!(stats[TaskName::Boot.index()].total_ops, 8);
    }
}
