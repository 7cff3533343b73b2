//! # AutoPower CLI
//!
//! Schedules machine wake, boot and shutdown through the OS task scheduler.
//!
//! Usage:
//!   autopower boot set --at "2026-10-20 07:30" --daily
//!   autopower shutdown set --at "23:00"
//!   autopower stage set --days mon,wed,fri --boot 08:00 --shutdown 18:00
//!   autopower list
//!   autopower status

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDateTime, NaiveTime};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use autopower_core::{
    AutoPowerConfig, AutoPowerError, Backend, Confirm, DaySet, FixedAnswer, PendingShutdown,
};
use autopower_scheduler::{LogSink, NotifyRouter, PendingStatus, PowerScheduler, ProbeMode, Report};

#[derive(Parser)]
#[command(
    name = "autopower",
    version,
    about = "⏻ AutoPower: scheduled wake, boot and shutdown"
)]
struct Cli {
    /// Config file (default: ~/.autopower/config.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Task store backend: schtasks or file
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Wake-capable boot task
    Boot {
        #[command(subcommand)]
        action: BootAction,
    },
    /// Timed shutdown countdown
    Shutdown {
        #[command(subcommand)]
        action: ShutdownCmd,
    },
    /// Restart the machine
    Restart {
        #[command(subcommand)]
        action: RestartCmd,
    },
    /// Weekly boot/shutdown pair
    Stage {
        #[command(subcommand)]
        action: StageAction,
    },
    /// Show registered schedules
    List,
    /// Is a shutdown countdown pending?
    Status {
        /// Cancel-probe: answers reliably but CANCELS any pending shutdown
        #[arg(long)]
        probe_cancel: bool,
    },
    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum BootAction {
    /// Register or replace the boot task
    Set {
        /// "YYYY-MM-DD HH:MM" or "HH:MM" (next occurrence)
        #[arg(long)]
        at: String,
        /// Repeat every day
        #[arg(long)]
        daily: bool,
        /// Keep the schedule off; nothing is registered
        #[arg(long)]
        disabled: bool,
    },
    /// Delete the boot task
    Remove,
}

#[derive(Subcommand)]
enum ShutdownCmd {
    /// Arm a shutdown countdown ending at the given time
    Set {
        #[arg(long)]
        at: String,
        /// Cancel any countdown instead of arming one
        #[arg(long)]
        disabled: bool,
    },
    /// Cancel the pending countdown
    Cancel,
    /// Power off immediately
    Now {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum RestartCmd {
    /// Restart immediately
    Now {
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum StageAction {
    /// Register the weekly boot/shutdown pair
    Set {
        /// e.g. mon,wed,fri or weekdays
        #[arg(long)]
        days: String,
        /// Boot time, HH:MM
        #[arg(long)]
        boot: String,
        /// Shutdown time, HH:MM
        #[arg(long)]
        shutdown: String,
        #[arg(long)]
        disabled: bool,
    },
    /// Delete both stage tasks
    Remove,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective config
    Show,
}

fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

/// Interactive y/N prompt on stdin.
struct PromptConfirm;

impl Confirm for PromptConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{prompt} [y/N] ");
        if std::io::stdout().flush().is_err() {
            return false;
        }
        let mut line = String::new();
        if std::io::stdin().lock().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

fn parse_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s.trim(), "%H:%M:%S"))
        .with_context(|| format!("invalid time '{s}', expected HH:MM"))
}

/// Full local date-time, or a bare time meaning its next occurrence.
fn parse_when(s: &str, now: NaiveDateTime) -> Result<NaiveDateTime> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(at) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(at);
        }
    }
    let time = parse_time(s)
        .with_context(|| format!("invalid date-time '{s}', expected \"YYYY-MM-DD HH:MM\""))?;
    let today = now.date().and_time(time);
    Ok(if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    })
}

fn print_report(report: &Report) {
    let mark = if report.changed { "✅" } else { "ℹ️ " };
    println!("{mark} {}", report.message);
}

/// Extra line for writes that only land in the preview store.
fn preview_notice(backend: Backend) -> Option<&'static str> {
    match backend {
        Backend::File => Some(
            "📝 Preview only: saved to the file store, nothing will fire (use --backend schtasks on Windows)",
        ),
        Backend::Schtasks => None,
    }
}

fn print_task_report(report: &Report, backend: Backend) {
    print_report(report);
    if report.changed {
        if let Some(notice) = preview_notice(backend) {
            println!("{notice}");
        }
    }
}

fn describe_status(status: PendingStatus, detail: &PendingShutdown) -> String {
    match (status, detail) {
        (PendingStatus::Pending, PendingShutdown::Pending { deadline, action }) => {
            let what = action.map(|a| a.to_string()).unwrap_or_else(|| "shutdown".into());
            match deadline {
                Some(at) => format!("⏳ Pending {what} at {}", at.format("%Y-%m-%d %H:%M:%S")),
                None => format!("⏳ Pending {what}"),
            }
        }
        (PendingStatus::Pending, _) => "⏳ Pending shutdown".to_string(),
        (PendingStatus::NotPending, PendingShutdown::Unknown) => {
            "No shutdown recorded (use --probe-cancel to check for certain)".to_string()
        }
        (PendingStatus::NotPending, _) => "No shutdown pending".to_string(),
    }
}

fn load_config(cli: &Cli) -> Result<(AutoPowerConfig, PathBuf)> {
    let path = cli
        .config
        .as_deref()
        .map(expand_path)
        .unwrap_or_else(AutoPowerConfig::default_path);
    let mut config = if path.exists() {
        AutoPowerConfig::load_from(&path)?
    } else {
        AutoPowerConfig::default()
    };
    if let Some(backend) = &cli.backend {
        config.platform.backend = backend.parse::<Backend>()?;
    }
    Ok((config, path))
}

fn build_scheduler(config: &AutoPowerConfig) -> PowerScheduler {
    let adapters = autopower_platform::build_adapters(&config.platform);
    let mut router = NotifyRouter::new();
    router.register(Arc::new(LogSink));
    PowerScheduler::new(adapters.repository, adapters.shutdown, config.scheduler_config())
        .with_router(router)
}

async fn run(cli: Cli) -> Result<()> {
    let (config, config_path) = load_config(&cli)?;

    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init { force } => {
                if config_path.exists() && !force {
                    bail!("{} already exists (use --force to overwrite)", config_path.display());
                }
                AutoPowerConfig::default().save_to(&config_path)?;
                println!("📝 Wrote {}", config_path.display());
                Ok(())
            }
            ConfigAction::Show => {
                println!("# {}", config_path.display());
                print!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
        };
    }

    let scheduler = build_scheduler(&config);
    let backend = config.platform.backend;
    let now = Local::now().naive_local();

    match cli.command {
        Command::Boot { action } => match action {
            BootAction::Set { at, daily, disabled } => {
                let at = parse_when(&at, now)?;
                let report = scheduler.set_boot_task(at, !disabled, daily).await?;
                print_task_report(&report, backend);
            }
            BootAction::Remove => print_report(&scheduler.remove_boot_task().await?),
        },
        Command::Shutdown { action } => match action {
            ShutdownCmd::Set { at, disabled } => {
                let at = parse_when(&at, now)?;
                print_report(&scheduler.set_shutdown_task(at, !disabled).await?);
            }
            ShutdownCmd::Cancel => print_report(&scheduler.cancel_shutdown().await?),
            ShutdownCmd::Now { yes } => {
                let report = if yes {
                    scheduler.shutdown_now(&FixedAnswer(true)).await?
                } else {
                    scheduler.shutdown_now(&PromptConfirm).await?
                };
                print_report(&report);
            }
        },
        Command::Restart {
            action: RestartCmd::Now { yes },
        } => {
            let report = if yes {
                scheduler.restart_now(&FixedAnswer(true)).await?
            } else {
                scheduler.restart_now(&PromptConfirm).await?
            };
            print_report(&report);
        }
        Command::Stage { action } => match action {
            StageAction::Set {
                days,
                boot,
                shutdown,
                disabled,
            } => {
                let days: DaySet = days.parse()?;
                let report = scheduler
                    .set_stage_task(&days, parse_time(&boot)?, parse_time(&shutdown)?, !disabled)
                    .await?;
                print_task_report(&report, backend);
            }
            StageAction::Remove => print_report(&scheduler.remove_stage_task().await?),
        },
        Command::List => {
            let rows = scheduler.list_schedule_summary().await?;
            if rows.is_empty() {
                println!("No scheduled tasks");
                return Ok(());
            }
            println!("{:<16} {:<18} {:<22} {}", "TASK", "TIME", "RECURRENCE", "ENABLED");
            for row in rows {
                println!(
                    "{:<16} {:<18} {:<22} {}",
                    row.label,
                    row.time,
                    row.recurrence,
                    if row.enabled { "yes" } else { "no" }
                );
            }
        }
        Command::Status { probe_cancel } => {
            if probe_cancel {
                let status = scheduler
                    .query_pending_shutdown_status(ProbeMode::CancelProbe)
                    .await?;
                match status {
                    PendingStatus::Pending => {
                        println!("⚠️  A shutdown was pending and has been cancelled by the probe")
                    }
                    PendingStatus::NotPending => println!("No shutdown pending"),
                }
            } else {
                let status = scheduler
                    .query_pending_shutdown_status(ProbeMode::ReadOnly)
                    .await?;
                let detail = scheduler.pending_shutdown().await?;
                println!("{}", describe_status(status, &detail));
            }
        }
        Command::Config { .. } => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "autopower=debug,autopower_scheduler=debug,autopower_platform=debug"
    } else {
        "autopower=info,autopower_scheduler=info,autopower_platform=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    if let Err(e) = run(cli).await {
        let code = match e.downcast_ref::<AutoPowerError>() {
            Some(err) if err.needs_elevation() => {
                eprintln!("❌ {err}");
                eprintln!("   Run AutoPower from an elevated (administrator) prompt.");
                2
            }
            _ => {
                eprintln!("❌ {e:#}");
                1
            }
        };
        std::process::exit(code);
    }
}
