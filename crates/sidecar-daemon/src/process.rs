//! Helper child process management

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};

use sidecar_core::prelude::*;
use sidecar_core::ProcessEvent;

/// Manages the helper child process.
///
/// The `Child` handle is moved into a dedicated `wait_for_exit` background task,
/// so the real exit code (and signal, on unix) is captured and emitted as
/// `ProcessEvent::Exited`. `HelperProcess` keeps a kill channel to request
/// termination without blocking and an atomic flag for synchronous
/// `has_exited()` checks.
pub struct HelperProcess {
    /// Process ID for logging
    pid: Option<u32>,
    /// One-shot sender that tells the wait task to kill the process.
    /// Consumed on first use (or on drop).
    kill_tx: Option<oneshot::Sender<()>>,
    /// Set to `true` by the wait task once the child has exited.
    exited: Arc<AtomicBool>,
}

impl HelperProcess {
    /// Spawn the helper at `executable` with `working_dir` as its current directory.
    ///
    /// The helper takes no arguments. Output lines and the final exit are sent
    /// to `event_tx` in the order they are observed.
    pub fn spawn(
        executable: &Path,
        working_dir: &Path,
        event_tx: mpsc::Sender<ProcessEvent>,
    ) -> std::result::Result<Self, StartError> {
        info!("Spawning helper: {}", executable.display());

        let mut child = Command::new(executable)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| StartError::spawn(e.to_string()))?;

        let pid = child.id();
        info!("Helper process started with PID: {:?}", pid);

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| StartError::spawn("stdout was not captured"))?;
        tokio::spawn(Self::stdout_reader(stdout, event_tx.clone()));

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| StartError::spawn("stderr was not captured"))?;
        tokio::spawn(Self::stderr_reader(stderr, event_tx.clone()));

        let exited = Arc::new(AtomicBool::new(false));
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        tokio::spawn(Self::wait_for_exit(
            child,
            kill_rx,
            event_tx,
            Arc::clone(&exited),
        ));

        Ok(Self {
            pid,
            kill_tx: Some(kill_tx),
            exited,
        })
    }

    /// Background task: owns `child`, waits for it to exit, emits `ProcessEvent::Exited`.
    ///
    /// Two ways the task can end:
    /// 1. The helper exits on its own - `child.wait()` resolves.
    /// 2. `kill_rx` fires (or its sender is dropped) - the child is killed, then reaped.
    async fn wait_for_exit(
        mut child: Child,
        kill_rx: oneshot::Receiver<()>,
        event_tx: mpsc::Sender<ProcessEvent>,
        exited: Arc<AtomicBool>,
    ) {
        let status = tokio::select! {
            result = child.wait() => {
                result
                    .inspect(|status| info!("Helper process exited with status: {:?}", status))
                    .inspect_err(|e| error!("Error waiting for helper process: {}", e))
                    .ok()
            }
            _ = kill_rx => {
                info!("Termination requested, killing helper process");
                if let Err(e) = child.kill().await {
                    error!("Failed to kill helper process: {}", e);
                }
                child
                    .wait()
                    .await
                    .inspect(|status| info!("Helper process killed, exit status: {:?}", status))
                    .inspect_err(|e| error!("Error waiting after kill: {}", e))
                    .ok()
            }
        };

        // Flag before the event so `has_exited()` is true once callers observe it.
        exited.store(true, Ordering::Release);

        let (code, signal) = match status {
            Some(status) => (status.code(), exit_signal(&status)),
            None => (None, None),
        };
        debug!(
            "Sending ProcessEvent::Exited {{ code: {:?}, signal: {:?} }}",
            code, signal
        );
        let _ = event_tx.send(ProcessEvent::Exited { code, signal }).await;
    }

    /// Read lines from stdout and send as `ProcessEvent::Stdout`.
    async fn stdout_reader(stdout: tokio::process::ChildStdout, tx: mpsc::Sender<ProcessEvent>) {
        let mut reader = BufReader::new(stdout).lines();

        while let Ok(Some(line)) = reader.next_line().await {
            trace!("stdout: {}", line);

            if tx.send(ProcessEvent::Stdout(line)).await.is_err() {
                debug!("stdout channel closed");
                break;
            }
        }

        debug!("stdout reader finished");
    }

    /// Read lines from stderr and send as `ProcessEvent::Stderr`.
    async fn stderr_reader(stderr: tokio::process::ChildStderr, tx: mpsc::Sender<ProcessEvent>) {
        let mut reader = BufReader::new(stderr).lines();

        while let Ok(Some(line)) = reader.next_line().await {
            trace!("stderr: {}", line);

            if tx.send(ProcessEvent::Stderr(line)).await.is_err() {
                debug!("stderr channel closed");
                break;
            }
        }

        debug!("stderr reader finished");
    }

    /// Request termination without waiting for the exit.
    ///
    /// Returns `false` when the process had already exited or termination was
    /// already requested.
    pub fn terminate(&mut self) -> bool {
        if self.has_exited() {
            return false;
        }
        match self.kill_tx.take() {
            Some(tx) => {
                // The wait task may have finished in the meantime; nothing to do then.
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }

    /// Non-blocking check backed by the flag set in the wait task.
    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        !self.has_exited()
    }

    /// Shared exit flag, for observers that do not own the handle
    pub fn exit_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.exited)
    }

    /// Get the process ID
    pub fn id(&self) -> Option<u32> {
        self.pid
    }
}

impl Drop for HelperProcess {
    fn drop(&mut self) {
        if !self.has_exited() {
            debug!("HelperProcess dropped while the helper may still be running");
            if let Some(tx) = self.kill_tx.take() {
                let _ = tx.send(());
            }
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<i32> {
    None
}
