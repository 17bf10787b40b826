//! Sidecar Host Library
//!
//! Supervises a bundled, platform-specific helper process and embeds the
//! endpoint it serves. The crates under `crates/` hold the logic; this
//! package wires them into the `sidecar` binary.

pub mod headless;
pub mod report;
pub mod runner;
pub mod signals;

pub use headless::runner::run_headless;
pub use report::{ConsoleReporter, Reporter};
pub use runner::{run, RunOptions};
