//! Application error types with rich context

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single helper start attempt.
///
/// Cloneable because one outcome is shared by every caller that awaits the
/// same attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("Unsupported platform: {platform}")]
    PlatformUnsupported { platform: String },

    #[error("Helper binary not found at: {path}")]
    BinaryMissing { path: PathBuf },

    #[error("Failed to spawn helper process: {reason}")]
    SpawnError { reason: String },

    #[error("Helper process exited before it became ready (code: {code:?}, signal: {signal:?})")]
    PrematureExit {
        code: Option<i32>,
        signal: Option<i32>,
    },
}

impl StartError {
    pub fn spawn(reason: impl Into<String>) -> Self {
        Self::SpawnError {
            reason: reason.into(),
        }
    }

    pub fn platform_unsupported(platform: impl Into<String>) -> Self {
        Self::PlatformUnsupported {
            platform: platform.into(),
        }
    }
}

/// Application error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // Helper Process Errors
    // ─────────────────────────────────────────────────────────────
    #[error(transparent)]
    Start(#[from] StartError),

    #[error("Helper process error: {message}")]
    Process { message: String },

    // ─────────────────────────────────────────────────────────────
    // Embedded Surface Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Helper endpoint unreachable after {attempts} attempts")]
    ConnectionRetriesExhausted { attempts: u32 },

    #[error("Surface message error: {message}")]
    Surface { message: String },

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid configuration: {message}")]
    ConfigInvalid { message: String },

    // ─────────────────────────────────────────────────────────────
    // Logging Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Logging setup failed: {message}")]
    Logging { message: String },
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn process(message: impl Into<String>) -> Self {
        Self::Process {
            message: message.into(),
        }
    }

    pub fn surface(message: impl Into<String>) -> Self {
        Self::Surface {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }

    pub fn logging(message: impl Into<String>) -> Self {
        Self::Logging {
            message: message.into(),
        }
    }

    /// Check if this is a recoverable error
    ///
    /// Recoverable errors leave the host usable; the user may retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Start(StartError::PrematureExit { .. })
                | Error::Start(StartError::SpawnError { .. })
                | Error::ConnectionRetriesExhausted { .. }
                | Error::Surface { .. }
        )
    }

    /// Check if this error should trigger application exit
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Start(StartError::PlatformUnsupported { .. })
                | Error::Start(StartError::BinaryMissing { .. })
                | Error::ConfigInvalid { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}
