//! Configuration file parsing for Sidecar Host
//!
//! Supports `.sidecar/config.toml` under the installation root.

pub mod settings;
pub mod types;

pub use settings::{config_path, init_config_dir, load_settings};
pub use types::*;
