//! Rebuilds user-facing schedule rows from what the task store holds.

use chrono::Weekday;

use autopower_core::{ScheduleRow, TaskDefinition, TaskName, TriggerRecord, day_name};

/// Display label for a task name.
pub fn label(name: TaskName) -> &'static str {
    match name {
        TaskName::Boot => "Boot",
        TaskName::Shutdown => "Shutdown",
        TaskName::StageBoot => "Stage boot",
        TaskName::StageShutdown => "Stage shutdown",
    }
}

/// Formatted time and recurrence text of one trigger.
pub fn describe(trigger: &TriggerRecord) -> (String, String) {
    match trigger {
        TriggerRecord::OneShot { at } => (at.format("%Y-%m-%d %H:%M").to_string(), "Once".into()),
        TriggerRecord::Daily { at } => (at.format("%Y-%m-%d %H:%M").to_string(), "Daily".into()),
        TriggerRecord::Weekly { day, at, .. } => (
            at.format("%H:%M").to_string(),
            format!("Weekly on {}", day_name(*day)),
        ),
    }
}

/// Rows for one task, weekly triggers in Monday-first order.
fn task_rows(def: &TaskDefinition) -> Vec<ScheduleRow> {
    let mut triggers: Vec<&TriggerRecord> = def.triggers.iter().collect();
    triggers.sort_by_key(|t| t.weekday().map(|d: Weekday| d.num_days_from_monday()));
    triggers
        .into_iter()
        .map(|t| {
            let (time, recurrence) = describe(t);
            ScheduleRow {
                label: label(def.name).to_string(),
                time,
                recurrence,
                enabled: def.enabled,
            }
        })
        .collect()
}

/// The "nothing registered" row.
pub fn placeholder_row() -> ScheduleRow {
    ScheduleRow {
        label: "No scheduled tasks".into(),
        time: "-".into(),
        recurrence: "-".into(),
        enabled: false,
    }
}

/// Summary rows for StageBoot, StageShutdown and Boot, in that order.
///
/// Disabled tasks are skipped. With `placeholder`, an empty summary becomes a
/// single placeholder row.
pub fn summarize(tasks: &[Option<TaskDefinition>], placeholder: bool) -> Vec<ScheduleRow> {
    let rows: Vec<ScheduleRow> = tasks
        .iter()
        .flatten()
        .filter(|def| def.enabled)
        .flat_map(task_rows)
        .collect();
    if rows.is_empty() && placeholder {
        vec![placeholder_row()]
    } else {
        rows
    }
}
