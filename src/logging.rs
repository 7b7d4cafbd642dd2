//! Progress log output.
//!
//! Every event is written as one `[YYYY-MM-DD HH:MM:SS][LEVEL] message`
//! line to the console and, when a path is given, appended to the durable
//! progress log file. The console can switch to JSON for log shippers; the
//! file always keeps the line format.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use chrono::Local;
use clap::ValueEnum;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::{AppError, Result};

/// Console log format.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, ValueEnum)]
pub enum LogFormat {
    /// `[timestamp][LEVEL] message` lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Event formatter producing `[timestamp][LEVEL] message key=value...`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressFormat;

impl<S, N> FormatEvent<S, N> for ProgressFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        write!(writer, "[{timestamp}][{}] ", event.metadata().level())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Install the global subscriber.
///
/// The filter comes from `RUST_LOG`, defaulting to `info`.
///
/// # Errors
///
/// Returns `AppError::Io` if the progress log cannot be opened and
/// `AppError::Config` if a global subscriber is already installed.
pub fn init_tracing(format: LogFormat, progress_log: Option<&Path>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console = match format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .event_format(ProgressFormat)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
    };

    let file = progress_log.map(open_progress_log).transpose()?.map(|file| {
        tracing_subscriber::fmt::layer()
            .event_format(ProgressFormat)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .boxed()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))
}

fn open_progress_log(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| {
            AppError::Io(format!(
                "failed to create log directory {}: {err}",
                parent.display()
            ))
        })?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| {
            AppError::Io(format!(
                "failed to open progress log {}: {err}",
                path.display()
            ))
        })
}
