//! # sidecar-core - Core Domain Types
//!
//! Foundation crate for Sidecar Host. Provides domain types, error handling,
//! process events, the host/surface message type, and the diagnostic sink.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, chrono, thiserror, tokio sync primitives, tracing).
//!
//! ## Public API
//!
//! ### Domain Types (`types`)
//! - [`PlatformTarget`] - Platform with a bundled helper executable
//! - [`ProcessState`] - Helper process lifecycle state
//! - [`ReadinessResult`], [`ReadinessSignal`] - How readiness was established
//! - [`ConnectionState`] - Embedded surface connection state
//!
//! ### Events (`events`)
//! - [`ProcessEvent`] - Helper stdout/stderr/exit events
//! - [`SurfaceMessage`] - One-way messages from the embedded surface to the host
//!
//! ### Diagnostics (`diagnostics`)
//! - [`DiagnosticSink`] - Append-only, ordered, subscribable lifecycle log
//! - [`DiagnosticEvent`], [`Severity`]
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Application error enum with `fatal` vs `recoverable` classification
//! - [`StartError`] - Cloneable failure of a helper start attempt
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//!
//! ## Prelude
//!
//! ```rust
//! use sidecar_core::prelude::*;
//! ```

pub mod diagnostics;
pub mod error;
pub mod events;
pub mod logging;
pub mod prelude;
pub mod types;

pub use diagnostics::{DiagnosticEvent, DiagnosticSink, Severity};
pub use error::{Error, Result, ResultExt, StartError};
pub use events::{ProcessEvent, SurfaceMessage, IFRAME_LOADED};
pub use types::{ConnectionState, PlatformTarget, ProcessState, ReadinessResult, ReadinessSignal};
