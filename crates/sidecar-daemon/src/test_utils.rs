//! Test utilities for helper supervision
//!
//! Provides fake helper binaries, loopback HTTP stubs, and stub probes.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

use crate::probe::{EndpointProbe, ProbeOutcome};
use crate::readiness::ReadinessConfig;
use crate::resolver::BINARIES_DIR;

/// A stdout line the default output marker accepts
pub const MARKER_LINE: &str = "Starting server on http://localhost:51837";

/// Write an executable `/bin/sh` script as the linux helper under
/// `<install_root>/binaries/proxy-linux`.
///
/// # Returns
/// The path of the installed script.
#[cfg(unix)]
pub fn install_fake_helper(install_root: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let binaries = install_root.join(BINARIES_DIR);
    std::fs::create_dir_all(&binaries).expect("create binaries dir");
    let path = binaries.join("proxy-linux");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write fake helper");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake helper");
    path
}

/// Readiness settings with short timers, probing `127.0.0.1:<port>`.
///
/// Warm-up is 50ms, probe timeout 200ms, leniency 1500ms.
pub fn fast_readiness(port: u16) -> ReadinessConfig {
    let url = Url::parse(&format!("http://127.0.0.1:{}/", port)).expect("valid loopback url");
    let mut config = ReadinessConfig::new(url);
    config.warmup = Duration::from_millis(50);
    config.probe_timeout = Duration::from_millis(200);
    config.leniency_window = Duration::from_millis(1500);
    config
}

/// A loopback port with nothing listening on it
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    port
}

/// Serve `status_line` with an empty body to every connection.
///
/// `status_line` is the full first response line, e.g. `"HTTP/1.1 200 OK"`.
pub async fn spawn_http_stub(status_line: &str) -> (u16, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind http stub");
    let port = listener.local_addr().expect("local addr").port();
    let response = format!(
        "{}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        status_line
    );

    let handle = tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let response = response.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    (port, handle)
}

/// Accept connections and never answer them
pub async fn spawn_silent_listener() -> (u16, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind silent listener");
    let port = listener.local_addr().expect("local addr").port();

    let handle = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    (port, handle)
}

/// Probe stub returning a fixed outcome and counting calls
#[derive(Debug, Clone)]
pub struct CountingProbe {
    outcome: ProbeOutcome,
    calls: Arc<AtomicUsize>,
}

impl CountingProbe {
    pub fn new(outcome: ProbeOutcome) -> Self {
        Self {
            outcome,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn reachable() -> Self {
        Self::new(ProbeOutcome::Reachable { status: 200 })
    }

    pub fn unreachable() -> Self {
        Self::new(ProbeOutcome::Unreachable {
            reason: "connection refused".to_string(),
        })
    }

    /// Number of probes issued so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EndpointProbe for CountingProbe {
    async fn probe(&self, _url: &Url, _timeout: Duration) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counting_probe_counts() {
        let probe = CountingProbe::reachable();
        let url = Url::parse("http://127.0.0.1:1/").unwrap();

        let outcome = EndpointProbe::probe(&probe, &url, Duration::from_millis(10)).await;

        assert!(outcome.is_reachable());
        assert_eq!(probe.calls(), 1);
        assert_eq!(probe.clone().calls(), 1);
    }

    #[test]
    fn test_fast_readiness_targets_port() {
        let config = fast_readiness(4242);
        assert_eq!(config.probe_url.port(), Some(4242));
        assert!(config.warmup < config.leniency_window);
    }

    #[cfg(unix)]
    #[test]
    fn test_install_fake_helper_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = install_fake_helper(dir.path(), "exit 0");
        assert_eq!(path, dir.path().join("binaries").join("proxy-linux"));
        assert!(path.is_file());
    }
}
