//! Sidecar Host - supervises a bundled helper process and embeds its endpoint
//!
//! This is the binary entry point. All logic lives in the library.

use std::path::PathBuf;

use clap::Parser;

use sidecar_app::init_config_dir;
use sidecar_host::{ConsoleReporter, RunOptions};

/// Sidecar Host - supervises a bundled helper process and embeds its endpoint
#[derive(Parser, Debug)]
#[command(name = "sidecar")]
#[command(about = "Supervises a bundled helper process and embeds its endpoint", long_about = None)]
struct Args {
    /// Installation root containing `binaries/` and `.sidecar/config.toml`
    #[arg(value_name = "INSTALL_ROOT")]
    install_root: Option<PathBuf>,

    /// Run in headless mode (NDJSON events on stdout)
    #[arg(long)]
    headless: bool,

    /// Write the embedded surface page to this path once the helper is ready
    #[arg(long, value_name = "PATH")]
    write_page: Option<PathBuf>,

    /// Create `.sidecar/config.toml` with defaults and exit
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let install_root = args
        .install_root
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    if args.init_config {
        let path = init_config_dir(&install_root)?;
        eprintln!("Config file: {}", path.display());
        return Ok(());
    }

    // Held until exit so buffered log lines are flushed.
    let _log_guard = sidecar_core::logging::init()?;

    let options = RunOptions {
        write_page: args.write_page,
    };

    if args.headless {
        sidecar_host::run_headless(&install_root, &options).await?;
    } else {
        sidecar_host::run(&install_root, &options, ConsoleReporter).await?;
    }

    Ok(())
}
