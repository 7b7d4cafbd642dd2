//! External agent invocation.
//!
//! Runs the configured agent CLI once per task descriptor with:
//! - the descriptor as the final argument after the fixed autonomous,
//!   single-task argument pattern;
//! - stdin closed and stdout/stderr captured as text;
//! - a hard wall-clock timeout, after which the agent's whole process group
//!   is killed;
//! - `kill_on_drop(true)` so an unwinding supervisor never leaks the child.
//!
//! Every failure mode is folded into a [`TaskResult`]; nothing here returns
//! an error to the supervisor.

use std::future::Future;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::GlobalConfig;
use crate::models::task::TaskResult;
use crate::util::truncate_text;

/// Error text reported for a run cut short by cancellation.
pub const INTERRUPTED_ERROR: &str = "interrupted";

/// Runs one task descriptor to completion.
///
/// Implementations must return within a bounded time and must resolve
/// promptly once `cancel` fires.
pub trait TaskRunner {
    /// Execute `task` and report the outcome.
    fn run(&self, task: &str, cancel: &CancellationToken) -> impl Future<Output = TaskResult>;
}

impl<R: TaskRunner + ?Sized> TaskRunner for &R {
    async fn run(&self, task: &str, cancel: &CancellationToken) -> TaskResult {
        (**self).run(task, cancel).await
    }
}

/// Agent CLI runner.
#[derive(Debug, Clone)]
pub struct TaskExecutor {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    timeout: Duration,
}

enum RunEnd {
    Exited(std::io::Result<ExitStatus>, String, String),
    TimedOut,
    Cancelled,
}

impl TaskExecutor {
    /// Build a runner for `program args... <task>` bounded by `timeout`.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: None,
            timeout,
        }
    }

    /// Build a runner from the agent and timeout sections of `config`.
    #[must_use]
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self {
            program: config.agent.program.clone(),
            args: config.agent.args.clone(),
            working_dir: config.agent.working_dir.clone(),
            timeout: config.task_timeout(),
        }
    }

    /// Run the agent in `dir` instead of the inherited working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn command(&self, task: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(task)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }

    async fn execute(&self, task: &str, cancel: &CancellationToken) -> TaskResult {
        let started = Instant::now();

        let mut child = match self.command(task).spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(program = %self.program, %err, "failed to launch agent");
                return TaskResult::failure(err.to_string(), started.elapsed());
            }
        };
        let pid = child.id();
        debug!(pid, program = %self.program, "agent process spawned");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let end = {
            let completion = async {
                let (out, err, status) =
                    tokio::join!(read_pipe(stdout), read_pipe(stderr), child.wait());
                RunEnd::Exited(status, out, err)
            };
            tokio::select! {
                end = completion => end,
                () = tokio::time::sleep(self.timeout) => RunEnd::TimedOut,
                () = cancel.cancelled() => RunEnd::Cancelled,
            }
        };

        match end {
            RunEnd::Exited(Ok(status), output, error) => {
                let duration = started.elapsed();
                if !status.success() {
                    debug!(%status, stderr = %truncate_text(&error, 200), "agent exited unsuccessfully");
                }
                TaskResult {
                    success: status.success(),
                    output,
                    error,
                    duration,
                }
            }
            RunEnd::Exited(Err(err), _, _) => {
                warn!(%err, "failed to wait on agent process");
                terminate(&mut child, pid).await;
                TaskResult::failure(err.to_string(), started.elapsed())
            }
            RunEnd::TimedOut => {
                warn!(timeout_secs = self.timeout.as_secs(), "task timed out, killing agent");
                terminate(&mut child, pid).await;
                TaskResult::failure(
                    format!("exceeded {} seconds", self.timeout.as_secs()),
                    self.timeout,
                )
            }
            RunEnd::Cancelled => {
                warn!("task interrupted, killing agent");
                terminate(&mut child, pid).await;
                TaskResult::failure(INTERRUPTED_ERROR, started.elapsed())
            }
        }
    }
}

impl TaskRunner for TaskExecutor {
    async fn run(&self, task: &str, cancel: &CancellationToken) -> TaskResult {
        let span = info_span!("agent_run", program = %self.program);
        async {
            info!(task = %truncate_text(task, 80), "starting task");
            self.execute(task, cancel).await
        }
        .instrument(span)
        .await
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(err) = pipe.read_to_end(&mut buf).await {
            debug!(%err, "agent pipe closed with error");
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Kill the agent and everything it spawned, then reap it.
async fn terminate(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pgid) = pid.and_then(|p| i32::try_from(p).ok()) {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Err(err) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
            debug!(pgid, %err, "process group already gone");
        }
    }
    #[cfg(not(unix))]
    let _ = pid;

    if let Err(err) = child.kill().await {
        debug!(%err, "agent process already reaped");
    }
}
