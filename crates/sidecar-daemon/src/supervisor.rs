//! Helper process supervisor
//!
//! Owns the single live helper process for its whole lifecycle:
//! `new` -> `start` / `stop` -> `dispose`.
//!
//! `start()` is idempotent while an attempt is `Starting` or `Running`:
//! concurrent callers share one outcome and only one process is spawned.
//! Each attempt is driven by a background task that feeds process output to
//! the [`ReadinessProber`], runs the warm-up probe and leniency timers, and
//! records every line and state transition in the [`DiagnosticSink`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use sidecar_core::prelude::*;
use sidecar_core::{DiagnosticSink, ProcessEvent, ProcessState, ReadinessResult};

use crate::probe::{EndpointProbe, HttpProbe, ProbeOutcome};
use crate::process::HelperProcess;
use crate::readiness::{ReadinessConfig, ReadinessProber};
use crate::resolver::resolve_executable;

/// Outcome of one start attempt, shared by every caller awaiting it
pub type StartOutcome = std::result::Result<ReadinessResult, StartError>;

/// Capacity of the process event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Everything the supervisor needs to find, start, and judge the helper
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Platform identifier, as in `std::env::consts::OS`
    pub os: String,
    /// Directory holding the bundled binaries
    pub binaries_dir: PathBuf,
    pub readiness: ReadinessConfig,
}

impl SupervisorConfig {
    pub fn new(binaries_dir: impl Into<PathBuf>, readiness: ReadinessConfig) -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            binaries_dir: binaries_dir.into(),
            readiness,
        }
    }

    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = os.into();
        self
    }
}

/// Mutable supervisor state, shared with the attempt task
#[derive(Default)]
struct Shared {
    state: ProcessState,
    /// Bumped on every new attempt; stale attempt tasks compare against it
    attempt: u64,
    process: Option<HelperProcess>,
    outcome: Option<watch::Receiver<Option<StartOutcome>>>,
    readiness: Option<ReadinessResult>,
}

enum Begin {
    Done(StartOutcome),
    Await(watch::Receiver<Option<StartOutcome>>),
}

/// Single-instance helper supervisor
pub struct Supervisor<P: EndpointProbe = HttpProbe> {
    config: Arc<SupervisorConfig>,
    sink: DiagnosticSink,
    probe: Arc<P>,
    shared: Arc<Mutex<Shared>>,
}

impl Supervisor<HttpProbe> {
    pub fn new(config: SupervisorConfig, sink: DiagnosticSink) -> Self {
        Self::with_probe(config, sink, HttpProbe)
    }
}

impl<P> Supervisor<P>
where
    P: EndpointProbe + Sync + 'static,
{
    pub fn with_probe(config: SupervisorConfig, sink: DiagnosticSink, probe: P) -> Self {
        Self {
            config: Arc::new(config),
            sink,
            probe: Arc::new(probe),
            shared: Arc::new(Mutex::new(Shared::default())),
        }
    }

    /// Start the helper, or join the attempt already in progress.
    ///
    /// Resolves once readiness is established or the attempt fails. Failures
    /// are not retried; calling `start()` again after a terminal state begins
    /// a fresh attempt.
    pub async fn start(&self) -> StartOutcome {
        match self.begin_start() {
            Begin::Done(outcome) => outcome,
            Begin::Await(rx) => await_outcome(rx).await,
        }
    }

    fn begin_start(&self) -> Begin {
        let mut shared = lock(&self.shared);

        match shared.state {
            ProcessState::Running => {
                let live = shared.process.as_ref().is_some_and(HelperProcess::is_running);
                match shared.readiness {
                    Some(result) if live => {
                        debug!("start() while running, reusing existing helper");
                        return Begin::Done(Ok(result));
                    }
                    // Stopped but its exit not yet observed: the new attempt
                    // supersedes it and the stale exit is ignored.
                    _ => debug!("start() after stop, beginning a new attempt"),
                }
            }
            ProcessState::Starting => {
                if let Some(rx) = &shared.outcome {
                    debug!("start() while starting, joining in-flight attempt");
                    return Begin::Await(rx.clone());
                }
            }
            _ => {}
        }

        shared.attempt += 1;
        shared.readiness = None;
        shared.outcome = None;
        transition(&mut shared, &self.sink, ProcessState::Starting);

        let resolved =
            match resolve_executable(&self.config.os, &self.config.binaries_dir, &self.sink) {
                Ok(resolved) => resolved,
                Err(e) => return Begin::Done(Err(self.fail_attempt(&mut shared, e))),
            };

        self.sink
            .info(format!("Starting helper: {}", resolved.path.display()));

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let process = match HelperProcess::spawn(&resolved.path, resolved.working_dir(), event_tx)
        {
            Ok(process) => process,
            Err(e) => return Begin::Done(Err(self.fail_attempt(&mut shared, e))),
        };

        let (outcome_tx, outcome_rx) = watch::channel(None);
        let exited = process.exit_flag();
        shared.process = Some(process);
        shared.outcome = Some(outcome_rx.clone());

        let attempt = AttemptTask {
            attempt: shared.attempt,
            config: Arc::clone(&self.config),
            sink: self.sink.clone(),
            probe: Arc::clone(&self.probe),
            shared: Arc::clone(&self.shared),
            exited,
            outcome_tx,
        };
        tokio::spawn(attempt.run(event_rx));

        Begin::Await(outcome_rx)
    }

    fn fail_attempt(&self, shared: &mut Shared, e: StartError) -> StartError {
        self.sink.error(format!("Failed to start helper: {}", e));
        transition(shared, &self.sink, ProcessState::Failed);
        e
    }

    /// Request termination of the helper, if one is running.
    ///
    /// Does not wait for the exit; it is observed and logged asynchronously.
    /// Safe to call repeatedly and before any `start()`.
    pub fn stop(&self) {
        let mut shared = lock(&self.shared);
        match shared.process.take() {
            Some(mut process) => {
                if process.terminate() {
                    self.sink.info("Stopping helper...");
                } else {
                    debug!("stop(): helper already exited or stopping");
                }
            }
            None => {
                self.sink.debug("Stop requested but no helper process is running");
            }
        }
    }

    /// Stop the helper and release the supervisor
    pub fn dispose(self) {
        self.stop();
        self.sink.info("Supervisor disposed");
    }

    pub fn state(&self) -> ProcessState {
        lock(&self.shared).state
    }

    /// Readiness of the current attempt, once established
    pub fn readiness(&self) -> Option<ReadinessResult> {
        lock(&self.shared).readiness
    }

    /// PID of the live helper process
    pub fn pid(&self) -> Option<u32> {
        lock(&self.shared).process.as_ref().and_then(|p| p.id())
    }

    pub fn sink(&self) -> &DiagnosticSink {
        &self.sink
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }
}

impl<P: EndpointProbe> Drop for Supervisor<P> {
    fn drop(&mut self) {
        // Dropping the handle kills a helper that is still running.
        if let Some(process) = lock(&self.shared).process.take() {
            if process.is_running() {
                debug!("Supervisor dropped with a live helper, terminating it");
            }
        }
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

fn transition(shared: &mut Shared, sink: &DiagnosticSink, next: ProcessState) {
    let current = shared.state;
    if current == next {
        return;
    }
    if !current.can_transition_to(next) {
        warn!("Ignoring invalid transition {} -> {}", current, next);
        return;
    }
    shared.state = next;
    sink.info(format!("state: {} -> {}", current, next));
}

async fn await_outcome(mut rx: watch::Receiver<Option<StartOutcome>>) -> StartOutcome {
    loop {
        let current = rx.borrow_and_update().clone();
        if let Some(outcome) = current {
            return outcome;
        }
        if rx.changed().await.is_err() {
            // The attempt task ended without settling (runtime shutting down).
            let last = rx.borrow().clone();
            return last.unwrap_or(Err(StartError::PrematureExit {
                code: None,
                signal: None,
            }));
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Attempt task
// ─────────────────────────────────────────────────────────────────

/// Drives one start attempt from spawn to process exit
struct AttemptTask<P> {
    attempt: u64,
    config: Arc<SupervisorConfig>,
    sink: DiagnosticSink,
    probe: Arc<P>,
    shared: Arc<Mutex<Shared>>,
    exited: Arc<AtomicBool>,
    outcome_tx: watch::Sender<Option<StartOutcome>>,
}

impl<P> AttemptTask<P>
where
    P: EndpointProbe + Sync + 'static,
{
    async fn run(self, mut events: mpsc::Receiver<ProcessEvent>) {
        let readiness = &self.config.readiness;
        let mut prober = ReadinessProber::new(readiness.marker.clone());

        let warmup = tokio::time::sleep(readiness.warmup);
        let leniency = tokio::time::sleep(readiness.leniency_window);
        tokio::pin!(warmup);
        tokio::pin!(leniency);

        let mut probe_issued = false;
        let mut leniency_elapsed = false;
        let mut probe_task: Option<JoinHandle<ProbeOutcome>> = None;

        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Some(ProcessEvent::Stdout(line)) => {
                            self.sink.info(format!("stdout: {}", line));
                            if let Some(result) = prober.observe_line(&line) {
                                abort_probe(&mut probe_task);
                                self.settle_ready(result);
                            }
                        }
                        Some(ProcessEvent::Stderr(line)) => {
                            self.sink.warn(format!("stderr: {}", line));
                        }
                        Some(ProcessEvent::Exited { code, signal }) => {
                            abort_probe(&mut probe_task);
                            self.handle_exit(&mut prober, code, signal);
                        }
                        None => break,
                    }
                }

                _ = &mut warmup, if !probe_issued && !prober.is_settled() => {
                    probe_issued = true;
                    let probe = Arc::clone(&self.probe);
                    let url = readiness.probe_url.clone();
                    let timeout = readiness.probe_timeout;
                    self.sink.debug(format!("Probing {}", url));
                    probe_task = Some(tokio::spawn(async move { probe.probe(&url, timeout).await }));
                }

                joined = poll_probe(&mut probe_task), if probe_task.is_some() => {
                    probe_task = None;
                    match joined {
                        Ok(outcome) => {
                            if let Some(result) = prober.observe_probe(&outcome) {
                                self.settle_ready(result);
                            } else if !prober.is_settled() {
                                self.log_probe_miss(&outcome);
                            }
                        }
                        Err(e) => debug!("probe task ended early: {}", e),
                    }
                }

                _ = &mut leniency, if !leniency_elapsed && !prober.is_settled() => {
                    leniency_elapsed = true;
                    let alive = !self.exited.load(Ordering::Acquire);
                    if let Some(result) = prober.observe_leniency_elapsed(alive) {
                        abort_probe(&mut probe_task);
                        self.sink.warn(format!(
                            "No readiness signal within {:?}; assuming helper is ready",
                            readiness.leniency_window
                        ));
                        self.settle_ready(result);
                    }
                }
            }
        }

        debug!("attempt {} finished", self.attempt);
    }

    fn is_current(&self, shared: &Shared) -> bool {
        shared.attempt == self.attempt
    }

    fn settle_ready(&self, result: ReadinessResult) {
        {
            let mut shared = lock(&self.shared);
            if self.is_current(&shared) {
                shared.readiness = Some(result);
                transition(&mut shared, &self.sink, ProcessState::Running);
            }
        }
        self.sink
            .info(format!("Helper ready (via {})", result.via_signal));
        self.outcome_tx.send_replace(Some(Ok(result)));
    }

    fn handle_exit(&self, prober: &mut ReadinessProber, code: Option<i32>, signal: Option<i32>) {
        self.sink.info(format!(
            "Helper exited with code {} and signal {}",
            display_opt(code),
            display_opt(signal)
        ));

        let next = if code == Some(0) {
            ProcessState::ExitedClean
        } else {
            ProcessState::ExitedError
        };
        {
            let mut shared = lock(&self.shared);
            if self.is_current(&shared) {
                shared.process = None;
                transition(&mut shared, &self.sink, next);
            }
        }

        if prober.observe_exit() {
            let e = StartError::PrematureExit { code, signal };
            self.sink.error(format!("Failed to start helper: {}", e));
            self.outcome_tx.send_replace(Some(Err(e)));
        }
    }

    fn log_probe_miss(&self, outcome: &ProbeOutcome) {
        let message = match outcome {
            ProbeOutcome::TimedOut => format!(
                "Probe timed out after {:?}",
                self.config.readiness.probe_timeout
            ),
            ProbeOutcome::Unreachable { reason } => format!("Probe failed: {}", reason),
            ProbeOutcome::Reachable { .. } => return,
        };
        self.sink.debug(message);
    }
}

async fn poll_probe(
    task: &mut Option<JoinHandle<ProbeOutcome>>,
) -> std::result::Result<ProbeOutcome, tokio::task::JoinError> {
    match task.as_mut() {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

fn abort_probe(task: &mut Option<JoinHandle<ProbeOutcome>>) {
    if let Some(handle) = task.take() {
        handle.abort();
    }
}

fn display_opt(value: Option<i32>) -> String {
    value.map_or_else(|| "none".to_string(), |v| v.to_string())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_utils::{
        closed_port, fast_readiness, install_fake_helper, spawn_http_stub, CountingProbe,
        MARKER_LINE,
    };
    use sidecar_core::ReadinessSignal;
    use std::time::Duration;
    use tempfile::TempDir;
    use url::Url;

    fn config_for(dir: &TempDir, readiness: ReadinessConfig) -> SupervisorConfig {
        SupervisorConfig::new(dir.path().join("binaries"), readiness).with_os("linux")
    }

    async fn wait_for_state(supervisor: &Supervisor<impl EndpointProbe + Sync + 'static>, state: ProcessState) {
        for _ in 0..100 {
            if supervisor.state() == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("state never became {:?}, is {:?}", state, supervisor.state());
    }

    #[tokio::test]
    async fn test_unsupported_platform_spawns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let probe = CountingProbe::unreachable();
        let config = config_for(&dir, fast_readiness(closed_port().await)).with_os("haiku");
        let supervisor = Supervisor::with_probe(config, DiagnosticSink::new(), probe.clone());

        let outcome = supervisor.start().await;

        assert_eq!(
            outcome,
            Err(StartError::PlatformUnsupported {
                platform: "haiku".to_string()
            })
        );
        assert_eq!(supervisor.state(), ProcessState::Failed);
        assert_eq!(supervisor.pid(), None);
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_binary_fails_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(&dir, fast_readiness(closed_port().await));
        let supervisor =
            Supervisor::with_probe(config, DiagnosticSink::new(), CountingProbe::unreachable());

        let outcome = supervisor.start().await;

        assert!(matches!(outcome, Err(StartError::BinaryMissing { .. })));
        assert_eq!(supervisor.state(), ProcessState::Failed);
    }

    #[tokio::test]
    #[serial_test::serial(helper_scripts)]
    async fn test_output_marker_readiness() {
        let dir = tempfile::tempdir().unwrap();
        install_fake_helper(dir.path(), &format!("echo '{}'\nexec sleep 30", MARKER_LINE));
        let probe = CountingProbe::reachable();
        let mut readiness = fast_readiness(closed_port().await);
        readiness.warmup = Duration::from_millis(400);
        let supervisor =
            Supervisor::with_probe(config_for(&dir, readiness), DiagnosticSink::new(), probe.clone());

        let outcome = supervisor.start().await;

        assert_eq!(outcome, Ok(ReadinessResult::via(ReadinessSignal::OutputMarker)));
        assert_eq!(supervisor.state(), ProcessState::Running);

        // The probe would have succeeded, but it is never issued after the marker.
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(probe.calls(), 0);
        assert_eq!(
            supervisor.readiness(),
            Some(ReadinessResult::via(ReadinessSignal::OutputMarker))
        );
        supervisor.dispose();
    }

    #[tokio::test]
    #[serial_test::serial(helper_scripts)]
    async fn test_network_probe_readiness() {
        let dir = tempfile::tempdir().unwrap();
        install_fake_helper(dir.path(), "echo 'booting'\nexec sleep 30");
        let (port, _server) = spawn_http_stub("HTTP/1.1 200 OK").await;
        let supervisor = Supervisor::new(config_for(&dir, fast_readiness(port)), DiagnosticSink::new());

        let outcome = supervisor.start().await;

        assert_eq!(outcome, Ok(ReadinessResult::via(ReadinessSignal::NetworkProbe)));
        assert_eq!(supervisor.state(), ProcessState::Running);
        supervisor.dispose();
    }

    #[tokio::test]
    #[serial_test::serial(helper_scripts)]
    async fn test_timeout_leniency_when_no_signal_fires() {
        let dir = tempfile::tempdir().unwrap();
        install_fake_helper(dir.path(), "exec sleep 30");
        let sink = DiagnosticSink::new();
        let supervisor = Supervisor::with_probe(
            config_for(&dir, fast_readiness(closed_port().await)),
            sink.clone(),
            CountingProbe::unreachable(),
        );

        let outcome = supervisor.start().await;

        assert_eq!(
            outcome,
            Ok(ReadinessResult::via(ReadinessSignal::TimeoutLeniency))
        );
        assert!(sink.messages().iter().any(|m| m.starts_with("Probe failed")));
        assert!(sink
            .messages()
            .iter()
            .any(|m| m.contains("assuming helper is ready")));
        supervisor.dispose();
    }

    #[tokio::test]
    #[serial_test::serial(helper_scripts)]
    async fn test_premature_exit_rejects_start() {
        let dir = tempfile::tempdir().unwrap();
        install_fake_helper(dir.path(), "echo 'bind: address already in use' >&2\nexit 3");
        let supervisor = Supervisor::with_probe(
            config_for(&dir, fast_readiness(closed_port().await)),
            DiagnosticSink::new(),
            CountingProbe::unreachable(),
        );

        let outcome = supervisor.start().await;

        assert_eq!(
            outcome,
            Err(StartError::PrematureExit {
                code: Some(3),
                signal: None
            })
        );
        assert_eq!(supervisor.state(), ProcessState::ExitedError);
        assert!(supervisor.state().is_terminal());
        assert_eq!(supervisor.pid(), None);
    }

    #[tokio::test]
    #[serial_test::serial(helper_scripts)]
    async fn test_clean_exit_before_ready_is_still_premature() {
        let dir = tempfile::tempdir().unwrap();
        install_fake_helper(dir.path(), "exit 0");
        let supervisor = Supervisor::with_probe(
            config_for(&dir, fast_readiness(closed_port().await)),
            DiagnosticSink::new(),
            CountingProbe::unreachable(),
        );

        let outcome = supervisor.start().await;

        assert!(matches!(
            outcome,
            Err(StartError::PrematureExit { code: Some(0), .. })
        ));
        assert_eq!(supervisor.state(), ProcessState::ExitedClean);
    }

    #[tokio::test]
    #[serial_test::serial(helper_scripts)]
    async fn test_concurrent_starts_spawn_one_process() {
        let dir = tempfile::tempdir().unwrap();
        let counter = dir.path().join("spawns.txt");
        install_fake_helper(
            dir.path(),
            &format!(
                "echo spawned >> '{}'\nsleep 0.2\necho '{}'\nexec sleep 30",
                counter.display(),
                MARKER_LINE
            ),
        );
        let supervisor = Supervisor::with_probe(
            config_for(&dir, fast_readiness(closed_port().await)),
            DiagnosticSink::new(),
            CountingProbe::unreachable(),
        );

        let (first, second) = tokio::join!(supervisor.start(), supervisor.start());
        let third = supervisor.start().await;

        assert_eq!(first, second);
        assert_eq!(first, third);
        assert!(first.is_ok());
        let spawns = std::fs::read_to_string(&counter).unwrap();
        assert_eq!(spawns.lines().count(), 1);
        supervisor.dispose();
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = Supervisor::with_probe(
            config_for(&dir, fast_readiness(closed_port().await)),
            DiagnosticSink::new(),
            CountingProbe::unreachable(),
        );

        supervisor.stop();
        supervisor.stop();

        assert_eq!(supervisor.state(), ProcessState::NotStarted);
        assert_eq!(supervisor.pid(), None);
    }

    #[tokio::test]
    #[serial_test::serial(helper_scripts)]
    async fn test_stop_after_ready_keeps_readiness_and_logs_exit() {
        let dir = tempfile::tempdir().unwrap();
        install_fake_helper(dir.path(), &format!("echo '{}'\nexec sleep 30", MARKER_LINE));
        let sink = DiagnosticSink::new();
        let supervisor = Supervisor::with_probe(
            config_for(&dir, fast_readiness(closed_port().await)),
            sink.clone(),
            CountingProbe::unreachable(),
        );

        let outcome = supervisor.start().await.unwrap();
        assert!(supervisor.pid().is_some());

        supervisor.stop();
        supervisor.stop();
        wait_for_state(&supervisor, ProcessState::ExitedError).await;

        assert_eq!(supervisor.readiness(), Some(outcome));
        assert_eq!(supervisor.pid(), None);
        let messages = sink.messages();
        assert_eq!(
            messages.iter().filter(|m| *m == "Stopping helper...").count(),
            1
        );
        assert!(messages.iter().any(|m| m.starts_with("Helper exited with code")));
    }

    #[tokio::test]
    #[serial_test::serial(helper_scripts)]
    async fn test_restart_after_terminal_state_spawns_again() {
        let dir = tempfile::tempdir().unwrap();
        install_fake_helper(dir.path(), "exit 1");
        let supervisor = Supervisor::with_probe(
            config_for(&dir, fast_readiness(closed_port().await)),
            DiagnosticSink::new(),
            CountingProbe::unreachable(),
        );

        assert!(supervisor.start().await.is_err());
        install_fake_helper(dir.path(), &format!("echo '{}'\nexec sleep 30", MARKER_LINE));
        let outcome = supervisor.start().await;

        assert_eq!(outcome, Ok(ReadinessResult::via(ReadinessSignal::OutputMarker)));
        assert_eq!(supervisor.state(), ProcessState::Running);
        supervisor.dispose();
    }

    #[tokio::test]
    #[serial_test::serial(helper_scripts)]
    async fn test_start_after_stop_spawns_fresh_helper() {
        let dir = tempfile::tempdir().unwrap();
        let counter = dir.path().join("spawns.txt");
        install_fake_helper(
            dir.path(),
            &format!(
                "echo spawned >> '{}'\necho '{}'\nexec sleep 30",
                counter.display(),
                MARKER_LINE
            ),
        );
        let supervisor = Supervisor::with_probe(
            config_for(&dir, fast_readiness(closed_port().await)),
            DiagnosticSink::new(),
            CountingProbe::unreachable(),
        );

        supervisor.start().await.unwrap();
        let first_pid = supervisor.pid();
        supervisor.stop();
        let outcome = supervisor.start().await;

        assert_eq!(outcome, Ok(ReadinessResult::via(ReadinessSignal::OutputMarker)));
        assert_eq!(supervisor.state(), ProcessState::Running);
        assert!(supervisor.pid().is_some());
        assert_ne!(supervisor.pid(), first_pid);
        let spawns = std::fs::read_to_string(&counter).unwrap();
        assert_eq!(spawns.lines().count(), 2);

        // The first helper's exit belongs to a superseded attempt
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(supervisor.state(), ProcessState::Running);
        assert!(supervisor.pid().is_some());
        supervisor.dispose();
    }

    #[tokio::test]
    #[serial_test::serial(helper_scripts)]
    async fn test_diagnostics_preserve_observed_order() {
        let dir = tempfile::tempdir().unwrap();
        install_fake_helper(
            dir.path(),
            &format!(
                "echo 'first'\nsleep 0.1\necho 'second' >&2\nsleep 0.1\necho '{}'\nexec sleep 30",
                MARKER_LINE
            ),
        );
        let sink = DiagnosticSink::new();
        let supervisor = Supervisor::with_probe(
            config_for(&dir, fast_readiness(closed_port().await)),
            sink.clone(),
            CountingProbe::unreachable(),
        );

        supervisor.start().await.unwrap();
        supervisor.dispose();

        let messages = sink.messages();
        let position = |needle: &str| {
            messages
                .iter()
                .position(|m| m == needle)
                .unwrap_or_else(|| panic!("missing {:?} in {:?}", needle, messages))
        };
        let starting = position("state: not-started -> starting");
        let first = position("stdout: first");
        let second = position("stderr: second");
        let marker = position(&format!("stdout: {}", MARKER_LINE));
        let running = position("state: starting -> running");

        assert!(starting < first);
        assert!(first < second);
        assert!(second < marker);
        assert!(marker < running);
        let events = sink.snapshot();
        assert!(events.windows(2).all(|w| w[0].seq + 1 == w[1].seq));
    }

    #[tokio::test]
    #[serial_test::serial(helper_scripts)]
    async fn test_exit_after_ready_does_not_invalidate_readiness() {
        let dir = tempfile::tempdir().unwrap();
        install_fake_helper(dir.path(), &format!("echo '{}'\nsleep 0.2\nexit 0", MARKER_LINE));
        let supervisor = Supervisor::with_probe(
            config_for(&dir, fast_readiness(closed_port().await)),
            DiagnosticSink::new(),
            CountingProbe::unreachable(),
        );

        let outcome = supervisor.start().await;
        wait_for_state(&supervisor, ProcessState::ExitedClean).await;

        assert_eq!(outcome, Ok(ReadinessResult::via(ReadinessSignal::OutputMarker)));
        assert_eq!(
            supervisor.readiness(),
            Some(ReadinessResult::via(ReadinessSignal::OutputMarker))
        );
    }

    #[test]
    fn test_config_defaults_to_current_os() {
        let url = Url::parse("http://localhost:51837/").unwrap();
        let config = SupervisorConfig::new("/opt/sidecar/binaries", ReadinessConfig::new(url));
        assert_eq!(config.os, std::env::consts::OS);
        assert_eq!(config.clone().with_os("linux").os, "linux");
    }
}
