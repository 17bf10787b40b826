//! Configuration types for Sidecar Host
//!
//! Defines:
//! - `Settings` - Contents of `.sidecar/config.toml`
//! - `HelperSettings`, `ReadinessSettings`, `SurfaceSettings` - Its sections

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use sidecar_core::prelude::*;
use sidecar_daemon::{
    OutputMarker, ReadinessConfig, SupervisorConfig, BINARIES_DIR, DEFAULT_MARKER_PATTERN,
};

use crate::reconnect::ReconnectPolicy;

/// Well-known local port the helper listens on
pub const DEFAULT_PORT: u16 = 51837;

/// Application settings (.sidecar/config.toml)
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub helper: HelperSettings,

    #[serde(default)]
    pub readiness: ReadinessSettings,

    #[serde(default)]
    pub surface: SurfaceSettings,
}

/// Where the helper lives and where it listens
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HelperSettings {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bundled binaries directory, relative to the installation root
    #[serde(default = "default_binaries_dir")]
    pub binaries_dir: PathBuf,
}

impl Default for HelperSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            binaries_dir: default_binaries_dir(),
        }
    }
}

impl HelperSettings {
    /// The endpoint both the probe and the surface target
    pub fn endpoint(&self) -> Result<Url> {
        Url::parse(&format!("http://localhost:{}/", self.port))
            .map_err(|e| Error::config_invalid(format!("helper.port {}: {}", self.port, e)))
    }

    /// Absolute binaries directory for `install_root`
    pub fn binaries_path(&self, install_root: &Path) -> PathBuf {
        if self.binaries_dir.is_absolute() {
            self.binaries_dir.clone()
        } else {
            install_root.join(&self.binaries_dir)
        }
    }
}

/// Readiness detection timing
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReadinessSettings {
    /// Regular expression matched against each stdout line
    #[serde(default = "default_marker")]
    pub marker: String,

    #[serde(default = "default_warmup_ms")]
    pub warmup_ms: u64,

    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Readiness is assumed after this long if the helper is still alive
    #[serde(default = "default_leniency_ms")]
    pub leniency_ms: u64,

    #[serde(default = "default_probe_path")]
    pub probe_path: String,
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            marker: default_marker(),
            warmup_ms: default_warmup_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            leniency_ms: default_leniency_ms(),
            probe_path: default_probe_path(),
        }
    }
}

/// Embedded surface reconnect behaviour
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SurfaceSettings {
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Consecutive failed loads before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for SurfaceSettings {
    fn default() -> Self {
        Self {
            load_timeout_ms: default_load_timeout_ms(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retries: default_max_retries(),
        }
    }
}

impl SurfaceSettings {
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            load_timeout: Duration::from_millis(self.load_timeout_ms),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            max_retries: self.max_retries,
        }
    }
}

impl Settings {
    /// Reject values that would make startup or reconnect misbehave
    pub fn validate(&self) -> Result<()> {
        if self.helper.port == 0 {
            return Err(Error::config_invalid("helper.port must not be 0"));
        }
        if self.readiness.leniency_ms == 0 {
            return Err(Error::config_invalid(
                "readiness.leniency_ms must be greater than 0",
            ));
        }
        if !self.readiness.probe_path.starts_with('/') {
            return Err(Error::config_invalid(format!(
                "readiness.probe_path must start with '/': {:?}",
                self.readiness.probe_path
            )));
        }
        OutputMarker::new(&self.readiness.marker).map_err(|e| {
            Error::config_invalid(format!("readiness.marker is not a valid regex: {}", e))
        })?;
        if self.surface.load_timeout_ms == 0 {
            return Err(Error::config_invalid(
                "surface.load_timeout_ms must be greater than 0",
            ));
        }
        if self.surface.max_retries == 0 {
            return Err(Error::config_invalid("surface.max_retries must be at least 1"));
        }
        Ok(())
    }

    pub fn endpoint(&self) -> Result<Url> {
        self.helper.endpoint()
    }

    /// Readiness settings in the form the supervisor consumes
    pub fn readiness_config(&self) -> Result<ReadinessConfig> {
        let probe_url = self.endpoint()?.join(&self.readiness.probe_path).map_err(|e| {
            Error::config_invalid(format!(
                "readiness.probe_path {:?}: {}",
                self.readiness.probe_path, e
            ))
        })?;
        let marker = OutputMarker::new(&self.readiness.marker).map_err(|e| {
            Error::config_invalid(format!("readiness.marker is not a valid regex: {}", e))
        })?;

        let mut config = ReadinessConfig::new(probe_url);
        config.marker = marker;
        config.warmup = Duration::from_millis(self.readiness.warmup_ms);
        config.probe_timeout = Duration::from_millis(self.readiness.probe_timeout_ms);
        config.leniency_window = Duration::from_millis(self.readiness.leniency_ms);
        Ok(config)
    }

    pub fn supervisor_config(&self, install_root: &Path) -> Result<SupervisorConfig> {
        Ok(SupervisorConfig::new(
            self.helper.binaries_path(install_root),
            self.readiness_config()?,
        ))
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_binaries_dir() -> PathBuf {
    PathBuf::from(BINARIES_DIR)
}

fn default_marker() -> String {
    DEFAULT_MARKER_PATTERN.to_string()
}

fn default_warmup_ms() -> u64 {
    500
}

fn default_probe_timeout_ms() -> u64 {
    1000
}

fn default_leniency_ms() -> u64 {
    3000
}

fn default_probe_path() -> String {
    "/".to_string()
}

fn default_load_timeout_ms() -> u64 {
    10_000
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_max_retries() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.helper.port, 51837);
        assert_eq!(settings.helper.binaries_dir, PathBuf::from("binaries"));
        assert_eq!(settings.readiness.warmup_ms, 500);
        assert_eq!(settings.readiness.probe_timeout_ms, 1000);
        assert_eq!(settings.readiness.leniency_ms, 3000);
        assert_eq!(settings.surface.load_timeout_ms, 10_000);
        assert_eq!(settings.surface.retry_delay_ms, 2000);
        assert_eq!(settings.surface.max_retries, 3);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_endpoint() {
        let settings = Settings::default();
        assert_eq!(
            settings.endpoint().unwrap().as_str(),
            "http://localhost:51837/"
        );
    }

    #[test]
    fn test_partial_section_uses_field_defaults() {
        let settings: Settings = toml::from_str("[surface]\nmax_retries = 5\n").unwrap();
        assert_eq!(settings.surface.max_retries, 5);
        assert_eq!(settings.surface.retry_delay_ms, 2000);
        assert_eq!(settings.helper, HelperSettings::default());
    }

    #[test]
    fn test_validate_rejects_zero_retries() {
        let mut settings = Settings::default();
        settings.surface.max_retries = 0;
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_validate_rejects_zero_leniency() {
        let mut settings = Settings::default();
        settings.readiness.leniency_ms = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_marker() {
        let mut settings = Settings::default();
        settings.readiness.marker = "([".to_string();
        assert!(settings.validate().is_err());
        assert!(settings.readiness_config().is_err());
    }

    #[test]
    fn test_validate_rejects_relative_probe_path() {
        let mut settings = Settings::default();
        settings.readiness.probe_path = "health".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_readiness_config_conversion() {
        let mut settings = Settings::default();
        settings.helper.port = 9000;
        settings.readiness.probe_path = "/health".to_string();
        settings.readiness.leniency_ms = 750;

        let config = settings.readiness_config().unwrap();

        assert_eq!(config.probe_url.as_str(), "http://localhost:9000/health");
        assert_eq!(config.leniency_window, Duration::from_millis(750));
        assert_eq!(config.warmup, Duration::from_millis(500));
        assert!(config.marker.matches("Starting server on http://localhost:9000"));
    }

    #[test]
    fn test_binaries_path_relative_and_absolute() {
        let root = Path::new("/opt/sidecar");
        let mut helper = HelperSettings::default();
        assert_eq!(helper.binaries_path(root), root.join("binaries"));

        helper.binaries_dir = PathBuf::from("/usr/lib/sidecar");
        assert_eq!(helper.binaries_path(root), PathBuf::from("/usr/lib/sidecar"));
    }

    #[test]
    fn test_surface_policy() {
        let policy = SurfaceSettings::default().policy();
        assert_eq!(policy.load_timeout, Duration::from_secs(10));
        assert_eq!(policy.retry_delay, Duration::from_secs(2));
        assert_eq!(policy.max_retries, 3);
    }

    #[test]
    fn test_max_retries_counts_failed_loads() {
        use crate::reconnect::{ReconnectMachine, SurfaceAction, SurfaceEvent};
        use sidecar_core::ConnectionState;

        let surface = SurfaceSettings {
            max_retries: 2,
            ..SurfaceSettings::default()
        };
        let mut m = ReconnectMachine::new(
            Url::parse("http://localhost:51837/").unwrap(),
            surface.policy(),
        );
        let is_navigate = |a: &SurfaceAction| matches!(a, SurfaceAction::Navigate { .. });

        let mut navigations = m
            .update(SurfaceEvent::Open)
            .iter()
            .filter(|a| is_navigate(a))
            .count();
        m.update(SurfaceEvent::LoadFailed);
        assert_eq!(m.state(), ConnectionState::Retrying { attempt: 1 });
        navigations += m
            .update(SurfaceEvent::RetryDue { generation: m.generation() })
            .iter()
            .filter(|a| is_navigate(a))
            .count();
        m.update(SurfaceEvent::LoadFailed);

        assert_eq!(m.state(), ConnectionState::Failed);
        assert_eq!(navigations, 2);
    }
}
