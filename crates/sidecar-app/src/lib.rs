//! sidecar-app - Configuration, embedded surface, and host orchestration
//!
//! This crate loads `.sidecar/config.toml`, implements the client reconnect
//! state machine (a pure TEA-style `update` plus an async timer driver),
//! renders the embedded surface page, and provides the [`Host`] that owns the
//! helper [`Supervisor`](sidecar_daemon::Supervisor).

pub mod config;
pub mod host;
pub mod reconnect;
pub mod surface;

pub use config::{init_config_dir, load_settings, Settings};
pub use host::Host;
pub use reconnect::{
    LocalNavigator, Navigator, ReconnectMachine, ReconnectPolicy, SurfaceAction, SurfaceDriver,
    SurfaceEvent,
};
pub use surface::{render_page, SurfacePanel};
