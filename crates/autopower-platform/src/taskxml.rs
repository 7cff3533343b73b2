//! Task Scheduler XML (schema 1.2) for AutoPower's task definitions.
//!
//! Rendering covers exactly what `TaskDefinition` models. Parsing reads the
//! same subset back from `schtasks /Query /XML`; unknown elements are ignored.

use chrono::{NaiveDateTime, Weekday};

use autopower_core::{
    AutoPowerError, BatteryPolicy, Result, RunLevel, TaskAction, TaskDefinition, TaskName,
    TriggerRecord,
};

const NAMESPACE: &str = "http://schemas.microsoft.com/windows/2004/02/mit/task";
const BOUNDARY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
/// LocalSystem; lets wake and power-off tasks run with nobody logged on.
const SYSTEM_SID: &str = "S-1-5-18";

const DAY_TAGS: [(Weekday, &str); 7] = [
    (Weekday::Mon, "Monday"),
    (Weekday::Tue, "Tuesday"),
    (Weekday::Wed, "Wednesday"),
    (Weekday::Thu, "Thursday"),
    (Weekday::Fri, "Friday"),
    (Weekday::Sat, "Saturday"),
    (Weekday::Sun, "Sunday"),
];

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn day_tag(day: Weekday) -> &'static str {
    DAY_TAGS
        .iter()
        .find(|(d, _)| *d == day)
        .map(|(_, tag)| *tag)
        .unwrap_or("Monday")
}

fn render_trigger(trigger: &TriggerRecord) -> String {
    let boundary = trigger.start_boundary().format(BOUNDARY_FORMAT);
    match trigger {
        TriggerRecord::OneShot { .. } => format!(
            "    <TimeTrigger>\n      <StartBoundary>{boundary}</StartBoundary>\n      <Enabled>true</Enabled>\n    </TimeTrigger>\n"
        ),
        TriggerRecord::Daily { .. } => format!(
            "    <CalendarTrigger>\n      <StartBoundary>{boundary}</StartBoundary>\n      <Enabled>true</Enabled>\n      <ScheduleByDay>\n        <DaysInterval>1</DaysInterval>\n      </ScheduleByDay>\n    </CalendarTrigger>\n"
        ),
        TriggerRecord::Weekly { day, .. } => format!(
            "    <CalendarTrigger>\n      <StartBoundary>{boundary}</StartBoundary>\n      <Enabled>true</Enabled>\n      <ScheduleByWeek>\n        <DaysOfWeek>\n          <{} />\n        </DaysOfWeek>\n        <WeeksInterval>1</WeeksInterval>\n      </ScheduleByWeek>\n    </CalendarTrigger>\n",
            day_tag(*day)
        ),
    }
}

/// Render a definition as a Task Scheduler registration document.
pub fn render(def: &TaskDefinition) -> String {
    let triggers: String = def.triggers.iter().map(render_trigger).collect();
    let principal = match def.run_level {
        RunLevel::Highest => format!(
            "      <UserId>{SYSTEM_SID}</UserId>\n      <RunLevel>HighestAvailable</RunLevel>\n"
        ),
        RunLevel::Limited => {
            "      <LogonType>InteractiveToken</LogonType>\n      <RunLevel>LeastPrivilege</RunLevel>\n"
                .to_string()
        }
    };
    let (program, arguments) = def.action.command_line();

    format!(
        r#"<?xml version="1.0" encoding="UTF-16"?>
<Task version="1.2" xmlns="{NAMESPACE}">
  <RegistrationInfo>
    <Description>{description}</Description>
  </RegistrationInfo>
  <Triggers>
{triggers}  </Triggers>
  <Principals>
    <Principal id="Author">
{principal}    </Principal>
  </Principals>
  <Settings>
    <MultipleInstancesPolicy>IgnoreNew</MultipleInstancesPolicy>
    <DisallowStartIfOnBatteries>{disallow}</DisallowStartIfOnBatteries>
    <StopIfGoingOnBatteries>{stop}</StopIfGoingOnBatteries>
    <StartWhenAvailable>false</StartWhenAvailable>
    <Enabled>{enabled}</Enabled>
    <WakeToRun>{wake}</WakeToRun>
  </Settings>
  <Actions Context="Author">
    <Exec>
      <Command>{program}</Command>
      <Arguments>{arguments}</Arguments>
    </Exec>
  </Actions>
</Task>
"#,
        description = escape(&def.description),
        disallow = def.battery_policy.disallow_start_on_batteries,
        stop = def.battery_policy.stop_if_going_on_batteries,
        enabled = def.enabled,
        wake = def.wake_capable,
        program = escape(program),
        arguments = escape(arguments),
    )
}

/// Encode for `schtasks /XML`: UTF-16LE with BOM.
pub fn to_utf16_bytes(xml: &str) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xFE];
    for unit in xml.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes
}

// ─── Parsing ──────────────────────────────────────────────────

/// Inner text of every `<tag …>…</tag>` element, in document order.
fn elements<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut found = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find(&open) {
        let after = &rest[start + open.len()..];
        // Reject prefix matches such as <Enabled> vs <EnabledX>.
        match after.chars().next() {
            Some('>') | Some(' ') | Some('\t') | Some('\r') | Some('\n') => {}
            Some('/') => {
                rest = after;
                continue;
            }
            _ => {
                rest = after;
                continue;
            }
        }
        let Some(gt) = after.find('>') else { break };
        let body = &after[gt + 1..];
        let Some(end) = body.find(&close) else { break };
        found.push(&body[..end]);
        rest = &body[end + close.len()..];
    }
    found
}

fn element<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    elements(xml, tag).into_iter().next()
}

fn text(xml: &str, tag: &str) -> Option<String> {
    element(xml, tag).map(|t| unescape(t.trim()))
}

fn flag(xml: &str, tag: &str, default: bool) -> bool {
    text(xml, tag)
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

/// Whether `<tag />` or `<tag/>` or `<tag></tag>` appears.
fn has_marker(xml: &str, tag: &str) -> bool {
    xml.contains(&format!("<{tag} />"))
        || xml.contains(&format!("<{tag}/>"))
        || xml.contains(&format!("<{tag}></{tag}>"))
}

fn parse_boundary(raw: &str) -> Result<NaiveDateTime> {
    // Drop fractional seconds and any UTC offset.
    let trimmed = raw.trim();
    let head = trimmed.get(..19).unwrap_or(trimmed);
    NaiveDateTime::parse_from_str(head, BOUNDARY_FORMAT)
        .map_err(|e| AutoPowerError::failed(format!("bad StartBoundary '{raw}': {e}")))
}

fn parse_triggers(xml: &str) -> Result<Vec<TriggerRecord>> {
    let mut triggers = Vec::new();
    let Some(block) = element(xml, "Triggers") else {
        return Ok(triggers);
    };

    for body in elements(block, "TimeTrigger") {
        let at = parse_boundary(&text(body, "StartBoundary").unwrap_or_default())?;
        triggers.push(TriggerRecord::OneShot { at });
    }

    for body in elements(block, "CalendarTrigger") {
        let at = parse_boundary(&text(body, "StartBoundary").unwrap_or_default())?;
        if element(body, "ScheduleByDay").is_some() {
            triggers.push(TriggerRecord::Daily { at });
        } else if let Some(week) = element(body, "ScheduleByWeek") {
            for (day, tag) in DAY_TAGS {
                if has_marker(week, tag) {
                    triggers.push(TriggerRecord::Weekly {
                        day,
                        at: at.time(),
                        start: at.date(),
                    });
                }
            }
        } else {
            tracing::debug!("Skipping unsupported calendar trigger");
        }
    }

    // Document order was split by kind above; restore it.
    triggers.sort_by_key(|t| xml.find(&t.start_boundary().format(BOUNDARY_FORMAT).to_string()));
    Ok(triggers)
}

/// Read a registration document back into a definition.
pub fn parse(name: TaskName, xml: &str) -> Result<TaskDefinition> {
    if element(xml, "Task").is_none() {
        return Err(AutoPowerError::failed(format!(
            "task {name}: response is not a task document"
        )));
    }
    let settings = element(xml, "Settings").unwrap_or_default();
    let registration = element(xml, "RegistrationInfo").unwrap_or_default();
    let run_level = match text(xml, "RunLevel").as_deref() {
        Some("LeastPrivilege") => RunLevel::Limited,
        _ => RunLevel::Highest,
    };
    let program = element(xml, "Exec")
        .and_then(|exec| text(exec, "Command"))
        .unwrap_or_default();

    Ok(TaskDefinition {
        name,
        description: text(registration, "Description").unwrap_or_default(),
        run_level,
        triggers: parse_triggers(xml)?,
        action: TaskAction::from_program(&program),
        wake_capable: flag(settings, "WakeToRun", false),
        battery_policy: BatteryPolicy {
            disallow_start_on_batteries: flag(settings, "DisallowStartIfOnBatteries", true),
            stop_if_going_on_batteries: flag(settings, "StopIfGoingOnBatteries", true),
        },
        enabled: flag(settings, "Enabled", true),
    })
}
