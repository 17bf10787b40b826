//! # sidecar-daemon - Helper Process Supervision
//!
//! Resolves the bundled helper executable, spawns and supervises it, and
//! decides when it is ready to accept connections.
//!
//! Depends on [`sidecar_core`] for domain types, diagnostics, and error handling.
//!
//! ## Public API
//!
//! ### Executable Resolution
//! - [`resolve_executable()`] - Map a platform to its bundled binary and make it executable
//!
//! ### Process Management
//! - [`HelperProcess`] - Spawn the helper and stream its output as [`ProcessEvent`]s
//! - [`Supervisor`] - Single-instance lifecycle owner (`start` / `stop` / `dispose`)
//!
//! ### Readiness
//! - [`OutputMarker`] - Startup banner matcher
//! - [`ReadinessProber`] - First-signal-wins readiness decision
//! - [`HttpProbe`] - Bounded-timeout HTTP reachability check
//!
//! [`ProcessEvent`]: sidecar_core::ProcessEvent

pub mod probe;
pub mod process;
pub mod readiness;
pub mod resolver;
pub mod supervisor;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;

pub use probe::{EndpointProbe, HttpProbe, LocalEndpointProbe, ProbeOutcome};
pub use process::HelperProcess;
pub use readiness::{OutputMarker, ReadinessConfig, ReadinessProber, DEFAULT_MARKER_PATTERN};
pub use resolver::{resolve_executable, ResolvedExecutable, BINARIES_DIR};
pub use supervisor::{StartOutcome, Supervisor, SupervisorConfig};
