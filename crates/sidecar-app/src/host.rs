//! Host orchestration
//!
//! The [`Host`] owns one [`Supervisor`] and the diagnostic sink for the
//! `activate -> open/dispose panels -> deactivate` lifecycle, and receives the
//! one-way messages posted by embedded surfaces.

use std::path::{Path, PathBuf};

use url::Url;

use sidecar_core::prelude::*;
use sidecar_core::{DiagnosticSink, ProcessState, ReadinessResult, SurfaceMessage};
use sidecar_daemon::{EndpointProbe, HttpProbe, Supervisor};

use crate::config::Settings;
use crate::reconnect::ReconnectMachine;
use crate::surface::{render_page, SurfacePanel};

pub struct Host<P: EndpointProbe = HttpProbe> {
    install_root: PathBuf,
    settings: Settings,
    endpoint: Url,
    sink: DiagnosticSink,
    supervisor: Supervisor<P>,
    /// User-facing notifications, most recent last
    notifications: Vec<String>,
    next_panel_id: u64,
    open_panels: usize,
}

impl Host<HttpProbe> {
    pub fn new(install_root: impl Into<PathBuf>, settings: Settings) -> Result<Self> {
        Self::with_probe(install_root, settings, HttpProbe)
    }
}

impl<P> Host<P>
where
    P: EndpointProbe + Sync + 'static,
{
    /// Build a host around `probe`. Settings are validated first.
    pub fn with_probe(
        install_root: impl Into<PathBuf>,
        settings: Settings,
        probe: P,
    ) -> Result<Self> {
        settings.validate()?;
        let install_root = install_root.into();
        let endpoint = settings.endpoint()?;
        let sink = DiagnosticSink::new();
        let supervisor =
            Supervisor::with_probe(settings.supervisor_config(&install_root)?, sink.clone(), probe);

        Ok(Self {
            install_root,
            settings,
            endpoint,
            sink,
            supervisor,
            notifications: Vec::new(),
            next_panel_id: 1,
            open_panels: 0,
        })
    }

    /// Start the helper.
    ///
    /// On failure one notification line is recorded for the user and the
    /// full error goes to the diagnostic sink. Calling again retries.
    pub async fn activate(&mut self) -> Result<ReadinessResult> {
        self.sink.info("Sidecar host activated");

        match self.supervisor.start().await {
            Ok(result) => {
                self.sink
                    .info(format!("Helper started successfully (via {})", result.via_signal));
                if result.is_assumed() {
                    self.sink.warn(
                        "Helper readiness was assumed; the surface will retry if it is not serving",
                    );
                }
                Ok(result)
            }
            Err(e) => {
                self.notifications
                    .push(format!("Failed to start helper: {}", e));
                self.sink.error(format!("Helper startup failed: {:?}", e));
                Err(e.into())
            }
        }
    }

    /// Create a panel: its page and a fresh reconnect machine in `Loading`
    pub fn open_surface(&mut self) -> SurfacePanel {
        let id = self.next_panel_id;
        self.next_panel_id += 1;
        self.open_panels += 1;

        let html = render_page(&self.settings.surface, &self.endpoint);
        let machine = ReconnectMachine::new(self.endpoint.clone(), self.settings.surface.policy());
        self.sink.info(format!("Surface panel {} created", id));

        SurfacePanel::new(id, html, machine)
    }

    /// Record a message posted by panel `panel_id`. Unknown types are only logged.
    pub fn handle_surface_message(&self, panel_id: u64, message: &SurfaceMessage) {
        match message {
            SurfaceMessage::IframeLoaded { .. } => {
                self.sink
                    .info(format!("Surface panel {} iframe loaded successfully", panel_id));
            }
            SurfaceMessage::Other { kind, .. } => {
                self.sink.info(format!("Unknown message type: {}", kind));
            }
        }
    }

    /// Parse and record a raw JSON message from panel `panel_id`
    pub fn handle_surface_json(&self, panel_id: u64, json: &str) -> Result<SurfaceMessage> {
        let message = SurfaceMessage::parse(json).inspect_err(|e| {
            self.sink
                .warn(format!("Ignoring malformed message from panel {}: {}", panel_id, e));
        })?;
        self.handle_surface_message(panel_id, &message);
        Ok(message)
    }

    pub fn dispose_panel(&mut self, panel: SurfacePanel) {
        self.open_panels = self.open_panels.saturating_sub(1);
        self.sink.info(format!("Surface panel {} disposed", panel.id()));
    }

    /// Stop the helper and tear the host down
    pub fn deactivate(self) {
        let sink = self.sink.clone();
        self.supervisor.dispose();
        sink.info("Sidecar host deactivated");
    }

    pub fn sink(&self) -> &DiagnosticSink {
        &self.sink
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    pub fn helper_state(&self) -> ProcessState {
        self.supervisor.state()
    }

    pub fn supervisor(&self) -> &Supervisor<P> {
        &self.supervisor
    }

    /// Notifications not yet shown to the user
    pub fn notifications(&self) -> &[String] {
        &self.notifications
    }

    /// Drain pending notifications once they have been shown
    pub fn take_notifications(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notifications)
    }

    pub fn open_panels(&self) -> usize {
        self.open_panels
    }
}
