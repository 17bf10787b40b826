//! Diagnostic sink - the ordered audit trail of helper lifecycle events
//!
//! Every state transition and every line the helper prints is appended here.
//! The sink is append-only: events are never mutated or removed within a
//! session, and insertion order is the only meaningful order.
//!
//! Appends are serialized by a mutex, and subscribers are notified while the
//! lock is held, so live subscribers see the same order as [`DiagnosticSink::snapshot`]
//! even when appenders run on different threads.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::broadcast;

/// Default capacity of the live subscriber channel
const SUBSCRIBER_CAPACITY: usize = 1024;

/// Severity of a diagnostic event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARN",
            Severity::Error => "ERROR",
        };
        f.pad(label)
    }
}

/// A single entry in the diagnostic log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticEvent {
    /// Position in the sink, starting at 0
    pub seq: u64,
    pub timestamp: DateTime<Local>,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {:5} {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.severity,
            self.message
        )
    }
}

struct SinkInner {
    events: Vec<DiagnosticEvent>,
    next_seq: u64,
}

/// Append-only, ordered, subscribable diagnostic log.
///
/// Cloning yields another handle to the same log.
#[derive(Clone)]
pub struct DiagnosticSink {
    inner: Arc<Mutex<SinkInner>>,
    live_tx: broadcast::Sender<DiagnosticEvent>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::with_subscriber_capacity(SUBSCRIBER_CAPACITY)
    }

    pub fn with_subscriber_capacity(capacity: usize) -> Self {
        let (live_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(Mutex::new(SinkInner {
                events: Vec::new(),
                next_seq: 0,
            })),
            live_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SinkInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an event and return it
    pub fn append(&self, severity: Severity, message: impl Into<String>) -> DiagnosticEvent {
        let message = message.into();
        mirror_to_tracing(severity, &message);

        let mut inner = self.lock();
        let event = DiagnosticEvent {
            seq: inner.next_seq,
            timestamp: Local::now(),
            severity,
            message,
        };
        inner.next_seq += 1;
        inner.events.push(event.clone());

        // No receivers is fine; the snapshot still holds the event.
        let _ = self.live_tx.send(event.clone());
        event
    }

    pub fn debug(&self, message: impl Into<String>) -> DiagnosticEvent {
        self.append(Severity::Debug, message)
    }

    pub fn info(&self, message: impl Into<String>) -> DiagnosticEvent {
        self.append(Severity::Info, message)
    }

    pub fn warn(&self, message: impl Into<String>) -> DiagnosticEvent {
        self.append(Severity::Warning, message)
    }

    pub fn error(&self, message: impl Into<String>) -> DiagnosticEvent {
        self.append(Severity::Error, message)
    }

    /// Subscribe to events appended from now on
    pub fn subscribe(&self) -> broadcast::Receiver<DiagnosticEvent> {
        self.live_tx.subscribe()
    }

    /// Copy of every event appended so far, in insertion order
    pub fn snapshot(&self) -> Vec<DiagnosticEvent> {
        self.lock().events.clone()
    }

    /// Messages only, in insertion order
    pub fn messages(&self) -> Vec<String> {
        self.lock()
            .events
            .iter()
            .map(|e| e.message.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DiagnosticSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticSink")
            .field("len", &self.len())
            .finish()
    }
}

fn mirror_to_tracing(severity: Severity, message: &str) {
    match severity {
        Severity::Debug => tracing::debug!(target: "sidecar::diagnostics", "{}", message),
        Severity::Info => tracing::info!(target: "sidecar::diagnostics", "{}", message),
        Severity::Warning => tracing::warn!(target: "sidecar::diagnostics", "{}", message),
        Severity::Error => tracing::error!(target: "sidecar::diagnostics", "{}", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_assigns_sequential_numbers() {
        let sink = DiagnosticSink::new();
        let a = sink.info("first");
        let b = sink.warn("second");
        let c = sink.error("third");

        assert_eq!((a.seq, b.seq, c.seq), (0, 1, 2));
        assert_eq!(sink.len(), 3);
        assert_eq!(sink.messages(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_clones_share_one_log() {
        let sink = DiagnosticSink::new();
        let other = sink.clone();
        sink.info("from sink");
        other.info("from clone");

        assert_eq!(sink.messages(), vec!["from sink", "from clone"]);
        assert_eq!(other.len(), 2);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let sink = DiagnosticSink::new();
        sink.info("one");
        let snapshot = sink.snapshot();
        sink.info("two");

        assert_eq!(snapshot.len(), 1);
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_concurrent_appends_keep_seq_and_order_consistent() {
        let sink = DiagnosticSink::new();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let sink = sink.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        sink.info(format!("thread {} line {}", t, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let events = sink.snapshot();
        assert_eq!(events.len(), 1000);
        for (index, event) in events.iter().enumerate() {
            assert_eq!(event.seq, index as u64);
        }

        // Per-thread order survives interleaving
        for t in 0..4 {
            let prefix = format!("thread {} ", t);
            let lines: Vec<usize> = events
                .iter()
                .filter(|e| e.message.starts_with(&prefix))
                .map(|e| e.message.rsplit(' ').next().unwrap().parse().unwrap())
                .collect();
            assert_eq!(lines, (0..250).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn test_subscribers_see_insertion_order() {
        let sink = DiagnosticSink::new();
        sink.info("before subscribe");
        let mut rx = sink.subscribe();

        sink.info("stdout: hello");
        sink.info("state: starting -> running");
        sink.warn("stderr: oops");

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(rx.recv().await.unwrap());
        }
        let messages: Vec<_> = seen.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["stdout: hello", "state: starting -> running", "stderr: oops"]
        );
        assert_eq!(seen[0].seq, 1);
    }

    #[test]
    fn test_display_includes_severity() {
        let sink = DiagnosticSink::new();
        let event = sink.warn("Could not set executable permission");
        let rendered = event.to_string();
        assert!(rendered.contains("WARN"));
        assert!(rendered.contains("Could not set executable permission"));
    }
}
