//! Headless mode runner - NDJSON output instead of console lines

use std::path::Path;

use sidecar_core::prelude::*;

use super::HeadlessReporter;
use crate::runner::{run, RunOptions};

/// Run the host, writing every event to stdout as JSON
pub async fn run_headless(install_root: &Path, options: &RunOptions) -> Result<()> {
    info!("Sidecar host starting in HEADLESS mode");
    run(install_root, options, HeadlessReporter).await
}
