//! Research agent CLI entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration**: load `research.toml` (or `--config`) and apply
//!    command-line overrides.
//! 2. **Wire observability**: configure `tracing-subscriber` (text or JSON on
//!    stderr) and, when an endpoint is configured, an OpenTelemetry OTLP
//!    exporter. All `tracing` spans and structured events emitted by every
//!    crate in the workspace flow through this layer.
//! 3. **Construct infrastructure**: create the LLM client, the SearxNG
//!    collector and the normalizer, and inject them into the
//!    [`nodes::WorkflowEngine`].
//! 4. **Select trigger mode**:
//!    - `run <prompt>`: one run, report path printed on stdout.
//!    - `queue add|list|run|reset-failed`: the persisted task queue.
//!
//! Ctrl-C cancels the active run at the next stage boundary; a run that has a
//! draft still writes a (partial) report.
//!
//! Exit status: `0` on success, `1` when a run failed or produced no report,
//! `2` for configuration and setup errors.

mod config;
mod report;
mod research;
mod telemetry;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use nodes::CancellationToken;
use pipeline::RunId;
use scheduler::{TaskQueue, TaskStatus};
use tracing::{error, info, warn};

use crate::config::{AppConfig, Overrides};
use crate::research::Researcher;

#[derive(Debug, Parser)]
#[command(name = "research-agent", version)]
#[command(about = "Local research agent: web search, LLM synthesis and self-review into a markdown report")]
struct Cli {
    /// Configuration file (default: ./research.toml when present).
    #[arg(long, global = true, env = "RESEARCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Research a prompt now and write the report.
    Run {
        #[arg(required = true)]
        prompt: Vec<String>,
    },
    /// Manage the persisted task queue.
    Queue {
        #[command(subcommand)]
        action: QueueCommand,
    },
}

#[derive(Debug, Subcommand)]
enum QueueCommand {
    /// Schedule a prompt for a later `queue run`.
    Add {
        #[arg(required = true)]
        prompt: Vec<String>,
    },
    /// Show all tasks and their status.
    List,
    /// Execute scheduled tasks one after the other.
    Run,
    /// Schedule failed tasks again.
    ResetFailed,
}

/// Why a command did not succeed; selects the exit status.
enum Failure {
    /// Configuration or collaborator construction failed.
    Setup(anyhow::Error),
    /// A run failed, produced no report, or the queue could not be used.
    Command(anyhow::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(mut config) => {
            config.apply(&cli.overrides);
            config
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::from(2);
        }
    };
    let telemetry = match telemetry::init(&config.telemetry) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::from(2);
        }
    };

    let code = match dispatch(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(Failure::Setup(err)) => {
            error!(error = %format!("{err:#}"), "setup failed");
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
        Err(Failure::Command(err)) => {
            error!(error = %format!("{err:#}"), "command failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    };
    telemetry.shutdown();
    code
}

async fn dispatch(command: Command, config: &AppConfig) -> Result<(), Failure> {
    match command {
        Command::Run { prompt } => {
            let researcher = Researcher::from_config(config).map_err(Failure::Setup)?;
            let path = researcher
                .research(RunId::new_random(), &prompt.join(" "), cancel_on_ctrl_c())
                .await
                .map_err(Failure::Command)?;
            println!("{}", path.display());
            Ok(())
        }
        Command::Queue {
            action: QueueCommand::Run,
        } => {
            let researcher = Researcher::from_config(config).map_err(Failure::Setup)?;
            run_queue(config, &researcher).await.map_err(Failure::Command)
        }
        Command::Queue {
            action: QueueCommand::Add { prompt },
        } => queue_add(config, &prompt.join(" ")).map_err(Failure::Command),
        Command::Queue {
            action: QueueCommand::List,
        } => queue_list(config).map_err(Failure::Command),
        Command::Queue {
            action: QueueCommand::ResetFailed,
        } => queue_reset_failed(config).map_err(Failure::Command),
    }
}

fn queue_add(config: &AppConfig, prompt: &str) -> Result<()> {
    let id = TaskQueue::open(&config.queue.path)?.add(prompt)?;
    println!("{id}");
    Ok(())
}

fn queue_list(config: &AppConfig) -> Result<()> {
    let queue = TaskQueue::open(&config.queue.path)?;
    for task in queue.tasks() {
        println!(
            "{}  {:<9}  {}  {}",
            task.id,
            task.status,
            task.updated_at.format("%Y-%m-%d %H:%M:%S"),
            task.prompt
        );
        if let Some(path) = &task.report_path {
            println!("    report: {}", path.display());
        }
        if let Some(reason) = &task.error {
            println!("    error: {reason}");
        }
    }
    Ok(())
}

fn queue_reset_failed(config: &AppConfig) -> Result<()> {
    let reset = TaskQueue::open(&config.queue.path)?.reset_failed()?;
    println!("{reset} task(s) rescheduled");
    Ok(())
}

async fn run_queue(config: &AppConfig, researcher: &Researcher) -> Result<()> {
    let mut queue = TaskQueue::open(&config.queue.path)?;
    let cancel = cancel_on_ctrl_c();
    info!(
        scheduled = queue.count(TaskStatus::Scheduled),
        path = %queue.path().display(),
        "running task queue"
    );

    let summary = queue
        .run_pending(&cancel, |task| {
            let cancel = cancel.clone();
            async move {
                // The task id doubles as run id so reports and queue entries correlate.
                researcher
                    .research(RunId::from_uuid(*task.id.as_uuid()), &task.prompt, cancel)
                    .await
                    .map_err(|err| format!("{err:#}"))
            }
        })
        .await?;

    println!(
        "{} done, {} failed, {} still scheduled",
        summary.done, summary.failed, summary.remaining
    );
    if summary.failed > 0 {
        bail!("{} queued task(s) failed", summary.failed);
    }
    Ok(())
}

/// A token cancelled by the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping at the next stage boundary");
            trigger.cancel();
        }
    });
    token
}
