//! Process runner: executes OS tools with a timeout and classifies failures.

use std::time::Duration;

use async_trait::async_trait;

use autopower_core::{AutoPowerError, Result};

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: &str) -> Self {
        Self {
            code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: &str) -> Self {
        Self {
            code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Stdout, or stderr when stdout is empty.
    pub fn text(&self) -> &str {
        if self.stdout.trim().is_empty() {
            self.stderr.trim()
        } else {
            self.stdout.trim()
        }
    }

    fn contains_any(&self, needles: &[&str]) -> bool {
        let haystack = format!("{}\n{}", self.stdout, self.stderr).to_lowercase();
        needles.iter().any(|n| haystack.contains(n))
    }

    /// The tool reported that the target does not exist.
    pub fn is_not_found(&self) -> bool {
        self.contains_any(NOT_FOUND_MARKERS)
    }

    /// The tool reported insufficient rights.
    pub fn is_access_denied(&self) -> bool {
        self.code == 5 || self.contains_any(ACCESS_DENIED_MARKERS)
    }
}

const NOT_FOUND_MARKERS: &[&str] = &[
    "cannot find",
    "does not exist",
    "系统找不到",
];

const ACCESS_DENIED_MARKERS: &[&str] = &[
    "access is denied",
    "access denied",
    "0x80070005",
    "permission denied",
    "must be root",
    "拒绝访问",
];

/// Map a failed run onto the error taxonomy.
pub fn classify_failure(tool: &str, out: &CommandOutput) -> AutoPowerError {
    let detail = format!("{tool} exited with {}: {}", out.code, out.text());
    if out.is_access_denied() {
        AutoPowerError::PermissionDenied(detail)
    } else {
        AutoPowerError::OperationFailed(detail)
    }
}

/// Decode tool output. schtasks may emit UTF-16LE when redirected.
pub fn decode_output(bytes: &[u8]) -> String {
    let utf16 = bytes.starts_with(&[0xFF, 0xFE])
        || (bytes.len() >= 4 && bytes[1] == 0 && bytes[3] == 0);
    if utf16 {
        let body = bytes.strip_prefix(&[0xFF, 0xFE]).unwrap_or(bytes);
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(bytes).to_string()
    }
}

/// Runs external programs.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

/// Spawns real processes through tokio.
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new(30)
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        tracing::debug!("▶️ {} {}", program, args.join(" "));
        let run = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(program)
                .args(args)
                .kill_on_drop(true)
                .output(),
        )
        .await;

        match run {
            Ok(Ok(o)) => Ok(CommandOutput {
                code: o.status.code().unwrap_or(-1),
                stdout: decode_output(&o.stdout),
                stderr: decode_output(&o.stderr),
            }),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => Err(
                AutoPowerError::AdapterUnavailable(format!("{program} not found: {e}")),
            ),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::PermissionDenied => Err(
                AutoPowerError::PermissionDenied(format!("cannot start {program}: {e}")),
            ),
            Ok(Err(e)) => Err(AutoPowerError::AdapterUnavailable(format!(
                "failed to start {program}: {e}"
            ))),
            Err(_) => Err(AutoPowerError::AdapterUnavailable(format!(
                "{program} timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}
