//! Output of a running host
//!
//! The runner reports lifecycle milestones and forwards every diagnostic
//! event through a [`Reporter`]: human-readable lines on stderr by default,
//! NDJSON on stdout in headless mode.

use std::path::Path;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use url::Url;

use sidecar_core::prelude::*;
use sidecar_core::{DiagnosticEvent, ReadinessResult};

pub trait Reporter: Clone + Send + Sync + 'static {
    fn diagnostic(&self, event: &DiagnosticEvent);

    fn ready(&self, readiness: &ReadinessResult, endpoint: &Url);

    fn error(&self, error: &Error);

    fn page_written(&self, path: &Path);

    fn shutdown(&self);
}

/// Plain-text reporter writing to stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn diagnostic(&self, event: &DiagnosticEvent) {
        eprintln!("{}", event);
    }

    fn ready(&self, readiness: &ReadinessResult, endpoint: &Url) {
        eprintln!("Helper ready at {} (via {})", endpoint, readiness.via_signal);
    }

    fn error(&self, error: &Error) {
        eprintln!("Error: {}", error);
    }

    fn page_written(&self, path: &Path) {
        eprintln!("Surface page written to {}", path.display());
    }

    fn shutdown(&self) {
        eprintln!("Shutting down...");
    }
}

/// Forward live diagnostics to `reporter` until every sink handle is dropped
pub fn spawn_diagnostic_forwarder<R: Reporter>(
    mut rx: broadcast::Receiver<DiagnosticEvent>,
    reporter: R,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => reporter.diagnostic(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Diagnostic output lagged, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("diagnostic forwarder finished");
    })
}
