//! Domain types shared by the supervisor and the embedded surface

use serde::{Deserialize, Serialize};
use std::fmt;

// ─────────────────────────────────────────────────────────────────
// Platform
// ─────────────────────────────────────────────────────────────────

/// A platform for which a helper executable is bundled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformTarget {
    WindowsExecutable,
    MacExecutable,
    LinuxExecutable,
}

impl PlatformTarget {
    /// Map a `std::env::consts::OS` identifier to a target
    pub fn from_os(os: &str) -> Option<Self> {
        match os {
            "windows" => Some(Self::WindowsExecutable),
            "macos" => Some(Self::MacExecutable),
            "linux" => Some(Self::LinuxExecutable),
            _ => None,
        }
    }

    /// Target for the platform this binary was compiled for
    pub fn current() -> Option<Self> {
        Self::from_os(std::env::consts::OS)
    }

    /// File name of the bundled executable
    pub fn executable_name(&self) -> &'static str {
        match self {
            Self::WindowsExecutable => "proxy-win.exe",
            Self::MacExecutable => "proxy-macos",
            Self::LinuxExecutable => "proxy-linux",
        }
    }

    /// Whether the executable bit must be set before spawning
    pub fn needs_exec_permission(&self) -> bool {
        !matches!(self, Self::WindowsExecutable)
    }
}

impl fmt::Display for PlatformTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WindowsExecutable => write!(f, "windows"),
            Self::MacExecutable => write!(f, "macos"),
            Self::LinuxExecutable => write!(f, "linux"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Process lifecycle
// ─────────────────────────────────────────────────────────────────

/// Lifecycle state of the helper process
///
/// Within one start attempt transitions only move forward. A new attempt
/// (`Starting`) may begin from a terminal state, or from `Running` once the
/// helper has been stopped and its exit is still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    #[default]
    NotStarted,
    Starting,
    Running,
    ExitedClean,
    ExitedError,
    Failed,
}

impl ProcessState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ExitedClean | Self::ExitedError | Self::Failed)
    }

    /// `Starting` or `Running`: a start request must reuse the live attempt
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }

    pub fn can_transition_to(&self, next: ProcessState) -> bool {
        use ProcessState::*;
        match (self, next) {
            (NotStarted, Starting) => true,
            (Starting, Running | ExitedClean | ExitedError | Failed) => true,
            (Running, ExitedClean | ExitedError | Starting) => true,
            (current, Starting) => current.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "not-started",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::ExitedClean => "exited-clean",
            Self::ExitedError => "exited-error",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ─────────────────────────────────────────────────────────────────
// Readiness
// ─────────────────────────────────────────────────────────────────

/// Which signal established readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessSignal {
    OutputMarker,
    NetworkProbe,
    TimeoutLeniency,
}

impl fmt::Display for ReadinessSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutputMarker => write!(f, "output marker"),
            Self::NetworkProbe => write!(f, "network probe"),
            Self::TimeoutLeniency => write!(f, "timeout leniency"),
        }
    }
}

/// Outcome of readiness detection for one start attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessResult {
    pub ready: bool,
    pub via_signal: ReadinessSignal,
}

impl ReadinessResult {
    pub fn via(signal: ReadinessSignal) -> Self {
        Self {
            ready: true,
            via_signal: signal,
        }
    }

    /// True when readiness was assumed rather than confirmed
    pub fn is_assumed(&self) -> bool {
        self.via_signal == ReadinessSignal::TimeoutLeniency
    }
}

// ─────────────────────────────────────────────────────────────────
// Embedded surface
// ─────────────────────────────────────────────────────────────────

/// Connection state of one embedded surface panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Loading,
    Connected,
    Retrying {
        attempt: u32,
    },
    Failed,
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Connected | Self::Failed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => write!(f, "loading"),
            Self::Connected => write!(f, "connected"),
            Self::Retrying { attempt } => write!(f, "retrying ({})", attempt),
            Self::Failed => write!(f, "failed"),
        }
    }
}
