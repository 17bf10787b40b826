//! Async driver for the reconnect machine
//!
//! Executes [`SurfaceAction`]s: navigation and loading/error UI through a
//! [`Navigator`], timers with `tokio::time`, and host notifications over a
//! one-way `mpsc` channel. Load results come back as [`SurfaceEvent`]s on the
//! event channel passed to [`SurfaceDriver::run`].

use tokio::sync::mpsc;
use tokio::time::Instant;
use url::Url;

use sidecar_core::prelude::*;
use sidecar_core::{ConnectionState, SurfaceMessage};

use super::{ReconnectMachine, SurfaceAction, SurfaceEvent};

/// The embedded view the driver navigates
#[trait_variant::make(Navigator: Send)]
pub trait LocalNavigator {
    /// Start loading `url`. Completion is reported as a `SurfaceEvent`.
    async fn navigate(&mut self, url: &Url);

    async fn show_error(&mut self, message: &str);

    async fn hide_loading(&mut self);
}

/// The single pending timer. Arming a new one replaces it.
#[derive(Debug, Clone, Copy)]
struct ArmedTimer {
    deadline: Instant,
    event: SurfaceEvent,
}

/// Runs one [`ReconnectMachine`] to a terminal state
pub struct SurfaceDriver<N> {
    machine: ReconnectMachine,
    navigator: N,
    host_tx: mpsc::Sender<SurfaceMessage>,
    timer: Option<ArmedTimer>,
}

impl<N: Navigator> SurfaceDriver<N> {
    pub fn new(
        machine: ReconnectMachine,
        navigator: N,
        host_tx: mpsc::Sender<SurfaceMessage>,
    ) -> Self {
        Self {
            machine,
            navigator,
            host_tx,
            timer: None,
        }
    }

    pub fn machine(&self) -> &ReconnectMachine {
        &self.machine
    }

    /// Open the surface and process events until `Connected` or `Failed`.
    ///
    /// Returns early with the current state if the event channel closes.
    pub async fn run(mut self, mut events: mpsc::Receiver<SurfaceEvent>) -> ConnectionState {
        self.dispatch(SurfaceEvent::Open).await;

        while !self.machine.is_terminal() {
            let event = tokio::select! {
                event = events.recv() => match event {
                    Some(event) => event,
                    None => {
                        debug!("surface event channel closed in state {}", self.machine.state());
                        break;
                    }
                },
                event = fire(self.timer) => {
                    self.timer = None;
                    event
                }
            };
            self.dispatch(event).await;
        }

        self.machine.state()
    }

    async fn dispatch(&mut self, event: SurfaceEvent) {
        for action in self.machine.update(event) {
            self.apply(action).await;
        }
    }

    async fn apply(&mut self, action: SurfaceAction) {
        match action {
            SurfaceAction::Navigate { url } => {
                debug!("navigating surface to {}", url);
                Navigator::navigate(&mut self.navigator, &url).await;
            }
            SurfaceAction::ArmLoadTimeout { generation, after } => {
                self.timer = Some(ArmedTimer {
                    deadline: Instant::now() + after,
                    event: SurfaceEvent::LoadTimedOut { generation },
                });
            }
            SurfaceAction::ArmRetry { generation, after } => {
                self.timer = Some(ArmedTimer {
                    deadline: Instant::now() + after,
                    event: SurfaceEvent::RetryDue { generation },
                });
            }
            SurfaceAction::CancelTimers => self.timer = None,
            SurfaceAction::Notify(message) => {
                // Fire-and-forget: a host that went away is not an error here.
                if self.host_tx.send(message).await.is_err() {
                    debug!("host channel closed, dropping surface notification");
                }
            }
            SurfaceAction::ShowError { message } => {
                Navigator::show_error(&mut self.navigator, &message).await
            }
            SurfaceAction::HideLoading => Navigator::hide_loading(&mut self.navigator).await,
        }
    }
}

/// Resolves with the timer's event at its deadline; never resolves when unarmed
async fn fire(timer: Option<ArmedTimer>) -> SurfaceEvent {
    match timer {
        Some(timer) => {
            tokio::time::sleep_until(timer.deadline).await;
            timer.event
        }
        None => std::future::pending().await,
    }
}
