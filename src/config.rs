//! Global configuration parsing and validation.
//!
//! The whole configuration surface is read once at startup into an
//! immutable [`GlobalConfig`] and shared with every component; nothing is
//! re-read while the supervisor runs.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::models::shift::ShiftWindow;
use crate::{AppError, Result};

/// External agent invocation.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AgentConfig {
    /// Agent binary, resolved through `PATH` when not absolute.
    #[serde(default = "default_agent_program")]
    pub program: String,
    /// Arguments placed before the task descriptor. They select the
    /// fully autonomous, single-task, non-interactive mode.
    #[serde(default = "default_agent_args")]
    pub args: Vec<String>,
    /// Working directory for the agent process; inherits the supervisor's
    /// when unset.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            program: default_agent_program(),
            args: default_agent_args(),
            working_dir: None,
        }
    }
}

fn default_agent_program() -> String {
    "cline".into()
}

fn default_agent_args() -> Vec<String> {
    ["task", "new", "--yolo", "--oneshot"]
        .into_iter()
        .map(ToOwned::to_owned)
        .collect()
}

/// Time limits (seconds).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutConfig {
    /// Hard wall-clock limit for one agent run.
    #[serde(default = "default_task_seconds")]
    pub task_seconds: u64,
    /// Pause between consecutive tasks; 0 disables the pause.
    #[serde(default = "default_inter_task_pause_seconds")]
    pub inter_task_pause_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            task_seconds: default_task_seconds(),
            inter_task_pause_seconds: default_inter_task_pause_seconds(),
        }
    }
}

fn default_task_seconds() -> u64 {
    3600
}

fn default_inter_task_pause_seconds() -> u64 {
    30
}

/// Poll intervals (seconds) for the supervisor's blocking waits.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PollingConfig {
    /// Coarse step while waiting for a shift to begin.
    #[serde(default = "default_shift_poll_seconds")]
    pub shift_poll_seconds: u64,
    /// Fine step while waiting for the queue to refill.
    #[serde(default = "default_queue_poll_seconds")]
    pub queue_poll_seconds: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            shift_poll_seconds: default_shift_poll_seconds(),
            queue_poll_seconds: default_queue_poll_seconds(),
        }
    }
}

fn default_shift_poll_seconds() -> u64 {
    300
}

fn default_queue_poll_seconds() -> u64 {
    60
}

fn default_queue_file() -> PathBuf {
    PathBuf::from("task_queue.txt")
}

fn default_state_file() -> PathBuf {
    PathBuf::from(".autonomous_state.json")
}

fn default_progress_log() -> PathBuf {
    PathBuf::from("autonomous_progress.log")
}

/// Global configuration parsed from the supervisor's TOML file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Shift windows in declaration order. Empty means the supervisor never
    /// starts work.
    #[serde(default)]
    pub shifts: Vec<ShiftWindow>,
    /// Newline-delimited task queue.
    #[serde(default = "default_queue_file")]
    pub queue_file: PathBuf,
    /// JSON session state.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    /// Append-only progress log mirrored from the console.
    #[serde(default = "default_progress_log")]
    pub progress_log: PathBuf,
    /// Agent invocation.
    #[serde(default)]
    pub agent: AgentConfig,
    /// Time limits.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Poll intervals.
    #[serde(default)]
    pub polling: PollingConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path. Relative
    /// store paths are resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|err| {
            AppError::Config(format!("failed to read config {}: {err}", path.display()))
        })?;
        let mut config = Self::from_toml_str(&raw)?;
        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Rebase relative store paths and the agent working directory onto
    /// `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        rebase(&mut self.queue_file);
        rebase(&mut self.state_file);
        rebase(&mut self.progress_log);
        if let Some(dir) = self.agent.working_dir.as_mut() {
            rebase(dir);
        }
    }

    /// Hard limit for one agent run.
    #[must_use]
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.task_seconds)
    }

    /// Pause between tasks.
    #[must_use]
    pub fn inter_task_pause(&self) -> Duration {
        Duration::from_secs(self.timeouts.inter_task_pause_seconds)
    }

    /// Coarse poll step while outside every shift.
    #[must_use]
    pub fn shift_poll_interval(&self) -> Duration {
        Duration::from_secs(self.polling.shift_poll_seconds)
    }

    /// Fine poll step while the queue is empty.
    #[must_use]
    pub fn queue_poll_interval(&self) -> Duration {
        Duration::from_secs(self.polling.queue_poll_seconds)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for shift in &self.shifts {
            if shift.name.trim().is_empty() {
                return Err(AppError::Config("shift name must not be empty".into()));
            }
            if !seen.insert(shift.name.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate shift name `{}`",
                    shift.name
                )));
            }
        }

        if self.agent.program.trim().is_empty() {
            return Err(AppError::Config("agent.program must not be empty".into()));
        }

        if self.timeouts.task_seconds == 0 {
            return Err(AppError::Config(
                "timeouts.task_seconds must be greater than zero".into(),
            ));
        }

        if self.polling.shift_poll_seconds == 0 || self.polling.queue_poll_seconds == 0 {
            return Err(AppError::Config(
                "polling intervals must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}
