//! Headless mode - JSON event output for scripts and tests
//!
//! Events are written to stdout as NDJSON (newline-delimited JSON), one event
//! per line. Each event has an "event" field naming its type.
//!
//! # Example Output
//!
//! ```json
//! {"event":"diagnostic","seq":0,"level":"info","message":"Sidecar host activated","timestamp":1704700001000}
//! {"event":"ready","via":"output_marker","assumed":false,"endpoint":"http://localhost:51837/","timestamp":1704700001500}
//! {"event":"shutdown","timestamp":1704700009000}
//! ```

pub mod runner;

use std::io::{self, Write};
use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use tracing::error;
use url::Url;

use sidecar_core::{DiagnosticEvent, Error, ReadinessResult, ReadinessSignal, Severity};

use crate::report::Reporter;

/// Events emitted in headless mode
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HeadlessEvent {
    /// An entry appended to the diagnostic sink
    Diagnostic {
        seq: u64,
        level: String,
        message: String,
        timestamp: i64,
    },

    /// The helper is ready to be embedded
    Ready {
        via: ReadinessSignal,
        /// True when readiness was assumed after the leniency window
        assumed: bool,
        endpoint: String,
        timestamp: i64,
    },

    /// Error occurred
    Error {
        message: String,
        fatal: bool,
        timestamp: i64,
    },

    /// The surface page was exported
    PageWritten { path: String, timestamp: i64 },

    /// The host is stopping the helper and exiting
    Shutdown { timestamp: i64 },
}

impl HeadlessEvent {
    /// Emit this event to stdout as JSON
    pub fn emit(&self) {
        let json = match serde_json::to_string(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize headless event: {}", e);
                return;
            }
        };

        let mut stdout = io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", json) {
            error!("Failed to write headless event to stdout: {}", e);
            return;
        }

        if let Err(e) = stdout.flush() {
            error!("Failed to flush headless stdout: {}", e);
        }
    }

    /// Get current timestamp in milliseconds
    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    // ─────────────────────────────────────────────────────────
    // Convenience constructors
    // ─────────────────────────────────────────────────────────

    pub fn diagnostic(event: &DiagnosticEvent) -> Self {
        Self::Diagnostic {
            seq: event.seq,
            level: level_name(event.severity).to_string(),
            message: event.message.clone(),
            timestamp: event.timestamp.timestamp_millis(),
        }
    }

    pub fn ready(readiness: &ReadinessResult, endpoint: &Url) -> Self {
        Self::Ready {
            via: readiness.via_signal,
            assumed: readiness.is_assumed(),
            endpoint: endpoint.to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn error(message: String, fatal: bool) -> Self {
        Self::Error {
            message,
            fatal,
            timestamp: Self::now(),
        }
    }

    pub fn page_written(path: &Path) -> Self {
        Self::PageWritten {
            path: path.display().to_string(),
            timestamp: Self::now(),
        }
    }

    pub fn shutdown() -> Self {
        Self::Shutdown {
            timestamp: Self::now(),
        }
    }
}

fn level_name(severity: Severity) -> &'static str {
    match severity {
        Severity::Debug => "debug",
        Severity::Info => "info",
        Severity::Warning => "warning",
        Severity::Error => "error",
    }
}

/// Reporter that emits [`HeadlessEvent`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessReporter;

impl Reporter for HeadlessReporter {
    fn diagnostic(&self, event: &DiagnosticEvent) {
        HeadlessEvent::diagnostic(event).emit();
    }

    fn ready(&self, readiness: &ReadinessResult, endpoint: &Url) {
        HeadlessEvent::ready(readiness, endpoint).emit();
    }

    fn error(&self, error: &Error) {
        HeadlessEvent::error(error.to_string(), error.is_fatal()).emit();
    }

    fn page_written(&self, path: &Path) {
        HeadlessEvent::page_written(path).emit();
    }

    fn shutdown(&self) {
        HeadlessEvent::shutdown().emit();
    }
}
