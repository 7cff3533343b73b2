//! Task definitions: the data model shared by the manager and the task store.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AutoPowerError;

/// The four reserved, mutually independent task names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskName {
    Boot,
    Shutdown,
    StageBoot,
    StageShutdown,
}

impl TaskName {
    pub const ALL: [TaskName; 4] = [
        TaskName::Boot,
        TaskName::Shutdown,
        TaskName::StageBoot,
        TaskName::StageShutdown,
    ];

    /// Stable identifier under which the task is registered.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskName::Boot => "Boot",
            TaskName::Shutdown => "Shutdown",
            TaskName::StageBoot => "StageBoot",
            TaskName::StageShutdown => "StageShutdown",
        }
    }

    /// Slot index, used by per-name locking.
    pub fn index(&self) -> usize {
        match self {
            TaskName::Boot => 0,
            TaskName::Shutdown => 1,
            TaskName::StageBoot => 2,
            TaskName::StageShutdown => 3,
        }
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskName {
    type Err = AutoPowerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskName::ALL
            .into_iter()
            .find(|n| n.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| AutoPowerError::failed(format!("unknown task name '{s}'")))
    }
}

/// Full English name of a weekday.
pub fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// A set of weekdays. Iteration is always Monday-first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "Vec<Weekday>", from = "Vec<Weekday>")]
pub struct DaySet(u8);

impl DaySet {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Self(0b111_1111)
    }

    pub fn weekdays() -> Self {
        Self(0b001_1111)
    }

    pub fn weekend() -> Self {
        Self(0b110_0000)
    }

    fn bit(day: Weekday) -> u8 {
        1 << day.num_days_from_monday()
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= Self::bit(day);
    }

    pub fn with(mut self, day: Weekday) -> Self {
        self.insert(day);
        self
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & Self::bit(day) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Days in canonical Monday…Sunday order.
    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        WEEK.into_iter().filter(|d| self.contains(*d))
    }

    /// "Monday, Wednesday, Friday".
    pub fn names(&self) -> String {
        self.iter().map(day_name).collect::<Vec<_>>().join(", ")
    }
}

impl FromIterator<Weekday> for DaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = DaySet::new();
        for day in iter {
            set.insert(day);
        }
        set
    }
}

impl From<Vec<Weekday>> for DaySet {
    fn from(days: Vec<Weekday>) -> Self {
        days.into_iter().collect()
    }
}

impl From<DaySet> for Vec<Weekday> {
    fn from(set: DaySet) -> Self {
        set.iter().collect()
    }
}

impl FromStr for DaySet {
    type Err = AutoPowerError;

    /// Accepts `mon,wed,fri`, full names, `weekdays`, `weekend` or `all`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = DaySet::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.to_ascii_lowercase().as_str() {
                "all" | "daily" => set.0 |= DaySet::all().0,
                "weekdays" => set.0 |= DaySet::weekdays().0,
                "weekend" => set.0 |= DaySet::weekend().0,
                other => {
                    let day: Weekday = other.parse().map_err(|_| {
                        AutoPowerError::validation(format!("unknown weekday '{part}'"))
                    })?;
                    set.insert(day);
                }
            }
        }
        Ok(set)
    }
}

/// A time-based condition that fires a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerRecord {
    /// Fire once at a specific local instant.
    OneShot { at: NaiveDateTime },
    /// Fire every day; the first occurrence is `at`.
    Daily { at: NaiveDateTime },
    /// Fire every week on `day` at `at`; `start` seeds the first occurrence.
    Weekly {
        day: Weekday,
        at: NaiveTime,
        start: NaiveDate,
    },
}

impl TriggerRecord {
    /// The `StartBoundary` registered with the task store.
    pub fn start_boundary(&self) -> NaiveDateTime {
        match self {
            TriggerRecord::OneShot { at } | TriggerRecord::Daily { at } => *at,
            TriggerRecord::Weekly { at, start, .. } => start.and_time(*at),
        }
    }

    pub fn weekday(&self) -> Option<Weekday> {
        match self {
            TriggerRecord::Weekly { day, .. } => Some(*day),
            _ => None,
        }
    }
}

/// What a registered task does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskAction {
    /// Wake the machine; the command itself is a no-op.
    Resume,
    /// Power the machine off immediately.
    PowerOff,
}

impl TaskAction {
    /// Native program and arguments executed by the task store.
    pub fn command_line(&self) -> (&'static str, &'static str) {
        match self {
            TaskAction::Resume => ("cmd.exe", "/c echo AutoPower wake"),
            TaskAction::PowerOff => ("shutdown", "/s /t 0"),
        }
    }

    /// Recover the action from a stored program name.
    pub fn from_program(program: &str) -> Self {
        let lower = program.to_ascii_lowercase();
        if lower.ends_with("shutdown") || lower.ends_with("shutdown.exe") {
            TaskAction::PowerOff
        } else {
            TaskAction::Resume
        }
    }
}

/// Action of a live, OS-level delayed shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownAction {
    PowerOff,
    Reboot,
}

impl fmt::Display for ShutdownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownAction::PowerOff => write!(f, "power off"),
            ShutdownAction::Reboot => write!(f, "restart"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunLevel {
    #[default]
    Highest,
    Limited,
}

/// Battery-exclusion flags of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryPolicy {
    pub disallow_start_on_batteries: bool,
    pub stop_if_going_on_batteries: bool,
}

impl BatteryPolicy {
    /// Fire regardless of power source.
    pub fn relaxed() -> Self {
        Self {
            disallow_start_on_batteries: false,
            stop_if_going_on_batteries: false,
        }
    }
}

impl Default for BatteryPolicy {
    /// Task Scheduler's own defaults.
    fn default() -> Self {
        Self {
            disallow_start_on_batteries: true,
            stop_if_going_on_batteries: true,
        }
    }
}

/// A named bundle of triggers, action and execution policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub name: TaskName,
    pub description: String,
    #[serde(default)]
    pub run_level: RunLevel,
    pub triggers: Vec<TriggerRecord>,
    pub action: TaskAction,
    pub wake_capable: bool,
    pub battery_policy: BatteryPolicy,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl TaskDefinition {
    /// Elevated, enabled task with no triggers yet.
    pub fn new(name: TaskName, description: &str, action: TaskAction) -> Self {
        Self {
            name,
            description: description.to_string(),
            run_level: RunLevel::Highest,
            triggers: Vec::new(),
            action,
            wake_capable: false,
            battery_policy: BatteryPolicy::default(),
            enabled: true,
        }
    }

    /// Wake-capable and allowed to run on battery.
    pub fn waking(mut self) -> Self {
        self.wake_capable = true;
        self.battery_policy = BatteryPolicy::relaxed();
        self
    }

    pub fn with_triggers(mut self, triggers: Vec<TriggerRecord>) -> Self {
        self.triggers = triggers;
        self
    }
}

/// State of the OS-level shutdown countdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingShutdown {
    Pending {
        deadline: Option<NaiveDateTime>,
        action: Option<ShutdownAction>,
    },
    NotPending,
    /// The adapter has no non-destructive way to tell.
    Unknown,
}

/// One display row of the schedule summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleRow {
    pub label: String,
    pub time: String,
    pub recurrence: String,
    pub enabled: bool,
}
