//! Settings parser for .sidecar/config.toml

use std::path::{Path, PathBuf};

use sidecar_core::prelude::*;

use super::types::Settings;

const CONFIG_FILENAME: &str = "config.toml";
const SIDECAR_DIR: &str = ".sidecar";

const DEFAULT_CONFIG: &str = r#"# Sidecar Host Configuration

[helper]
port = 51837                # Port the helper listens on
binaries_dir = "binaries"   # Relative to the installation root

[readiness]
# Stdout line that marks the helper as ready (regular expression)
marker = 'Starting server on http://localhost:\d+'
warmup_ms = 500             # Delay before the network probe
probe_timeout_ms = 1000
leniency_ms = 3000          # Assume ready after this long if still running
probe_path = "/"

[surface]
load_timeout_ms = 10000
retry_delay_ms = 2000
max_retries = 3             # Consecutive failed loads before giving up
"#;

/// Path of the config file under `install_root`
pub fn config_path(install_root: &Path) -> PathBuf {
    install_root.join(SIDECAR_DIR).join(CONFIG_FILENAME)
}

/// Load settings from .sidecar/config.toml
///
/// Returns default settings if file doesn't exist or can't be parsed.
pub fn load_settings(install_root: &Path) -> Settings {
    let config_path = config_path(install_root);

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", config_path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            Settings::default()
        }
    }
}

/// Create .sidecar/config.toml with commented defaults if missing
pub fn init_config_dir(install_root: &Path) -> Result<PathBuf> {
    let sidecar_dir = install_root.join(SIDECAR_DIR);

    if !sidecar_dir.exists() {
        std::fs::create_dir_all(&sidecar_dir)
            .with_context(|| format!("Failed to create {}", sidecar_dir.display()))?;
    }

    let config_path = sidecar_dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        std::fs::write(&config_path, DEFAULT_CONFIG)
            .map_err(|e| Error::config(format!("Failed to write config.toml: {}", e)))?;
        info!("Wrote default config to {:?}", config_path);
    }

    Ok(config_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_settings_defaults() {
        let temp = tempdir().unwrap();
        let settings = load_settings(temp.path());
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_settings_custom() {
        let temp = tempdir().unwrap();
        let sidecar_dir = temp.path().join(".sidecar");
        std::fs::create_dir_all(&sidecar_dir).unwrap();

        let config = r#"
[helper]
port = 8080

[surface]
retry_delay_ms = 500
max_retries = 1
"#;
        std::fs::write(sidecar_dir.join("config.toml"), config).unwrap();

        let settings = load_settings(temp.path());

        assert_eq!(settings.helper.port, 8080);
        assert_eq!(settings.surface.retry_delay_ms, 500);
        assert_eq!(settings.surface.max_retries, 1);
        assert_eq!(settings.readiness.leniency_ms, 3000);
    }

    #[test]
    fn test_load_settings_invalid_toml() {
        let temp = tempdir().unwrap();
        let sidecar_dir = temp.path().join(".sidecar");
        std::fs::create_dir_all(&sidecar_dir).unwrap();
        std::fs::write(sidecar_dir.join("config.toml"), "[helper\nport = ").unwrap();

        let settings = load_settings(temp.path());
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_init_config_dir_writes_parseable_defaults() {
        let temp = tempdir().unwrap();

        let path = init_config_dir(temp.path()).unwrap();

        assert_eq!(path, config_path(temp.path()));
        let settings = load_settings(temp.path());
        assert_eq!(settings, Settings::default());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_init_config_dir_keeps_existing_file() {
        let temp = tempdir().unwrap();
        let sidecar_dir = temp.path().join(".sidecar");
        std::fs::create_dir_all(&sidecar_dir).unwrap();
        std::fs::write(sidecar_dir.join("config.toml"), "[helper]\nport = 9999\n").unwrap();

        init_config_dir(temp.path()).unwrap();

        assert_eq!(load_settings(temp.path()).helper.port, 9999);
    }
}
