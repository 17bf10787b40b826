//! Host runner - activation, optional page export, and shutdown

use std::path::{Path, PathBuf};
use std::time::Duration;

use sidecar_app::{load_settings, Host, SurfacePanel};
use sidecar_core::prelude::*;

use crate::report::{spawn_diagnostic_forwarder, Reporter};
use crate::signals::wait_for_shutdown;

/// How long to keep forwarding diagnostics after the helper was stopped
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Options shared by console and headless runs
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Write the embedded surface page here once the helper is ready
    pub write_page: Option<PathBuf>,
}

/// Activate a host for `install_root` and keep the helper running until a
/// termination signal arrives.
pub async fn run<R: Reporter>(install_root: &Path, options: &RunOptions, reporter: R) -> Result<()> {
    info!("═══════════════════════════════════════════════════════");
    info!("Sidecar host starting");
    info!("Install root: {}", install_root.display());
    info!("═══════════════════════════════════════════════════════");

    let settings = load_settings(install_root);
    let mut host = Host::new(install_root, settings).inspect_err(|e| reporter.error(e))?;
    let forwarder = spawn_diagnostic_forwarder(host.sink().subscribe(), reporter.clone());

    let activation = tokio::select! {
        result = host.activate() => result.map(Some),
        signal = wait_for_shutdown() => signal.map(|()| None),
    };

    let result = match activation {
        Ok(Some(readiness)) => {
            reporter.ready(&readiness, host.endpoint());
            serve(&mut host, options, &reporter).await
        }
        Ok(None) => {
            info!("Shutdown requested during startup");
            Ok(())
        }
        Err(e) => Err(e),
    };

    if let Err(ref e) = result {
        error!("Host error: {:?}", e);
        reporter.error(e);
    }

    reporter.shutdown();
    host.deactivate();

    if tokio::time::timeout(DRAIN_TIMEOUT, forwarder).await.is_err() {
        debug!("Helper exit not observed within {:?}", DRAIN_TIMEOUT);
    }

    info!("Sidecar host exiting");
    result
}

async fn serve<R: Reporter>(host: &mut Host, options: &RunOptions, reporter: &R) -> Result<()> {
    let panel = match &options.write_page {
        Some(path) => Some(write_page(host, path, reporter)?),
        None => None,
    };

    wait_for_shutdown().await?;

    if let Some(panel) = panel {
        host.dispose_panel(panel);
    }
    Ok(())
}

fn write_page<R: Reporter>(host: &mut Host, path: &Path, reporter: &R) -> Result<SurfacePanel> {
    let panel = host.open_surface();
    std::fs::write(path, panel.html())
        .map_err(|e| Error::surface(format!("Failed to write page to {}: {}", path.display(), e)))?;
    reporter.page_written(path);
    Ok(panel)
}
