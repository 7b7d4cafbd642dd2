#![forbid(unsafe_code)]

//! `shift-supervisor` — runs queued agent tasks during configured shifts.
//!
//! `run` (the default) serves one shift session and exits; `status` and
//! `queue` inspect or extend the stores without starting the loop.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use shift_supervisor::logging::{init_tracing, LogFormat};
use shift_supervisor::orchestrator::{SessionOutcome, Supervisor, TaskExecutor};
use shift_supervisor::persistence::{FileQueueStore, JsonStateStore, QueueStore, StateStore};
use shift_supervisor::scheduler::{Clock, ShiftScheduler, SystemClock};
use shift_supervisor::{AppError, GlobalConfig, Result};

/// Exit status after a user-requested stop (128 + SIGINT).
const EXIT_INTERRUPTED: u8 = 130;
/// Exit status after a fatal error.
const EXIT_CRASHED: u8 = 1;

#[derive(Debug, Parser)]
#[command(
    name = "shift-supervisor",
    about = "Run queued agent tasks during configured shifts",
    version,
    long_about = None
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "supervisor.toml")]
    config: PathBuf,

    /// Console log format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve one shift session (default).
    Run,
    /// Print session counters, queue length and shift timing.
    Status,
    /// Inspect or extend the task queue.
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
}

#[derive(Debug, Subcommand)]
enum QueueAction {
    /// List pending task descriptors in execution order.
    List,
    /// Append a task descriptor to the end of the queue.
    Add {
        /// Task instruction passed verbatim to the agent.
        task: String,
    },
}

fn main() -> ExitCode {
    let args = Cli::parse();

    let config = match GlobalConfig::load_from_path(&args.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("shift-supervisor: {err}");
            return ExitCode::from(EXIT_CRASHED);
        }
    };

    let result = match args.command.unwrap_or(Command::Run) {
        Command::Run => return run(args.log_format, config),
        Command::Status => status(&config),
        Command::Queue { action } => queue(&config, action),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("shift-supervisor: {err}");
            ExitCode::from(EXIT_CRASHED)
        }
    }
}

fn run(log_format: LogFormat, config: GlobalConfig) -> ExitCode {
    if let Err(err) = init_tracing(log_format, Some(&config.progress_log)) {
        eprintln!("shift-supervisor: {err}");
        return ExitCode::from(EXIT_CRASHED);
    }

    match serve(config) {
        Ok(SessionOutcome::Stopped) => ExitCode::SUCCESS,
        Ok(SessionOutcome::Interrupted) => ExitCode::from(EXIT_INTERRUPTED),
        Err(err) => {
            error!(%err, "supervisor crashed");
            error!("{err:#?}");
            ExitCode::from(EXIT_CRASHED)
        }
    }
}

fn serve(config: GlobalConfig) -> Result<SessionOutcome> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(async move {
            let config = Arc::new(config);
            info!(
                queue = %config.queue_file.display(),
                state = %config.state_file.display(),
                "configuration loaded"
            );

            let cancel = CancellationToken::new();
            let signal_ct = cancel.clone();
            let signal_handle = tokio::spawn(async move {
                shutdown_signal().await;
                info!("shutdown signal received");
                signal_ct.cancel();
            });

            let supervisor = Supervisor::new(
                Arc::clone(&config),
                FileQueueStore::new(&config.queue_file),
                JsonStateStore::new(&config.state_file),
                TaskExecutor::from_config(&config),
                SystemClock,
            );
            let report = supervisor.run(&cancel).await;
            signal_handle.abort();
            Ok(report?.outcome)
        })
}

fn status(config: &GlobalConfig) -> Result<()> {
    let state = JsonStateStore::new(&config.state_file).load();
    let queue = FileQueueStore::new(&config.queue_file);
    let pending = queue.load()?;
    let claim = queue.load_claim()?;
    let scheduler = ShiftScheduler::new(config.shifts.clone());
    let now = SystemClock.now();

    let session_start = state
        .session_start
        .map_or_else(|| "-".to_owned(), |start| start.to_string());

    println!("session start:   {session_start}");
    println!("tasks completed: {}", state.tasks_completed);
    println!("tasks failed:    {}", state.tasks_failed);
    println!("runtime:         {:.2} hours", state.total_runtime_hours);
    println!("queued tasks:    {}", pending.len());
    if let Some(claim) = claim {
        let stage = if claim.started { "started" } else { "claimed" };
        println!("in flight:       {} ({stage} at {})", claim.task, claim.claimed_at);
    }
    match scheduler.current_shift_name(now) {
        Some(name) => println!("current shift:   {name}"),
        None => println!(
            "next shift in:   {:.1} hours",
            scheduler.until_next_shift(now).as_secs_f64() / 3600.0
        ),
    }
    Ok(())
}

fn queue(config: &GlobalConfig, action: QueueAction) -> Result<()> {
    let store = FileQueueStore::new(&config.queue_file);
    match action {
        QueueAction::List => {
            for (position, task) in store.load()?.iter().enumerate() {
                println!("{:>3}. {task}", position + 1);
            }
        }
        QueueAction::Add { task } => {
            store.append(&task)?;
            println!("queued: {}", task.trim());
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}
