//! Embedded surface: page rendering and per-panel state

pub mod page;

pub use page::{render_page, render_page_titled, PAGE_TITLE};

use tokio::sync::mpsc;

use sidecar_core::SurfaceMessage;

use crate::reconnect::{Navigator, ReconnectMachine, SurfaceDriver};

/// One opened surface: its document and a fresh reconnect machine
#[derive(Debug, Clone)]
pub struct SurfacePanel {
    id: u64,
    html: String,
    machine: ReconnectMachine,
}

impl SurfacePanel {
    pub(crate) fn new(id: u64, html: String, machine: ReconnectMachine) -> Self {
        Self { id, html, machine }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn machine(&self) -> &ReconnectMachine {
        &self.machine
    }

    /// Drive this panel's reconnect machine with `navigator`
    pub fn driver<N: Navigator>(
        &self,
        navigator: N,
        host_tx: mpsc::Sender<SurfaceMessage>,
    ) -> SurfaceDriver<N> {
        SurfaceDriver::new(self.machine.clone(), navigator, host_tx)
    }
}
