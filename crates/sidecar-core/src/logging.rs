//! Logging configuration using tracing
//!
//! The log goes to a daily-rotated file, never to stdout: headless mode owns
//! stdout for NDJSON events.

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::{Error, Result, ResultExt};

/// Environment variable controlling the log filter
pub const LOG_ENV_VAR: &str = "SIDECAR_LOG";

/// Environment variable overriding the log directory
pub const LOG_DIR_ENV_VAR: &str = "SIDECAR_LOG_DIR";

/// Filter used when `SIDECAR_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "sidecar=info,warn";

const LOG_FILE_PREFIX: &str = "sidecar.log";

/// Keeps the background log writer alive; drop it last to flush.
#[must_use = "dropping the guard stops the log writer"]
pub struct LogGuard {
    _worker: WorkerGuard,
    log_dir: PathBuf,
}

impl LogGuard {
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

/// Initialize the logging subsystem
///
/// Log level is controlled by `SIDECAR_LOG`, the directory by `SIDECAR_LOG_DIR`
/// (default: `<data_local_dir>/sidecar/logs`).
///
/// # Examples
/// ```bash
/// SIDECAR_LOG=debug sidecar
/// SIDECAR_LOG=sidecar::diagnostics=trace sidecar --headless
/// ```
pub fn init() -> Result<LogGuard> {
    let log_dir = log_directory(std::env::var_os(LOG_DIR_ENV_VAR).map(PathBuf::from));
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Creating log directory {}", log_dir.display()))?;

    let appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_PREFIX);
    let (writer, worker) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(env_filter(std::env::var(LOG_ENV_VAR).ok().as_deref()))
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_timer(fmt::time::ChronoLocal::new(
                    "%Y-%m-%d %H:%M:%S%.3f".to_string(),
                )),
        )
        .try_init()
        .map_err(|e| Error::logging(e.to_string()))?;

    tracing::info!(
        "Sidecar Host {} logging to {}",
        env!("CARGO_PKG_VERSION"),
        log_dir.display()
    );

    Ok(LogGuard {
        _worker: worker,
        log_dir,
    })
}

/// Parse `directives`, falling back to [`DEFAULT_FILTER`] when absent or invalid
fn env_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

fn log_directory(override_dir: Option<PathBuf>) -> PathBuf {
    override_dir.unwrap_or_else(|| {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sidecar")
            .join("logs")
    })
}
