//! Client reconnect state machine
//!
//! Pure `update(event) -> actions` core for the embedded surface. The machine
//! never sleeps or navigates itself; it returns [`SurfaceAction`]s and the
//! [`SurfaceDriver`] (or the inline page script) carries them out.
//!
//! ```text
//! Loading --Loaded--------------------------------> Connected
//! Loading --LoadFailed / LoadTimedOut--> Retrying(n) --RetryDue--> Loading
//!                                    \-> Failed        (n == max_retries)
//! ```
//!
//! Every entry to `Loading` bumps a generation counter and cancels pending
//! timers. Timer events carry the generation they were armed for and are
//! dropped when stale.

mod driver;

pub use driver::{LocalNavigator, Navigator, SurfaceDriver};

use std::time::Duration;

use chrono::Utc;
use url::Url;

use sidecar_core::prelude::*;
use sidecar_core::{ConnectionState, SurfaceMessage};

/// Query parameter that defeats caching on re-navigation
pub const RETRY_QUERY_PARAM: &str = "_sidecar_retry";

/// Reconnect timing and bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// How long a navigation may stay in flight before it counts as failed
    pub load_timeout: Duration,
    /// Delay before re-navigating after a failure
    pub retry_delay: Duration,
    /// Consecutive failed loads after which the surface gives up
    pub max_retries: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            load_timeout: Duration::from_millis(10_000),
            retry_delay: Duration::from_millis(2000),
            max_retries: 3,
        }
    }
}

/// Inputs to the reconnect machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// The surface was created; issue the first navigation
    Open,
    /// The embedded endpoint finished loading
    Loaded,
    /// The navigation reported an error
    LoadFailed,
    /// The load timer armed for `generation` fired
    LoadTimedOut { generation: u64 },
    /// The retry timer armed for `generation` fired
    RetryDue { generation: u64 },
}

/// Side effects requested by the reconnect machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceAction {
    Navigate { url: Url },
    ArmLoadTimeout { generation: u64, after: Duration },
    ArmRetry { generation: u64, after: Duration },
    /// Drop every pending timer
    CancelTimers,
    /// Send a one-way message to the host
    Notify(SurfaceMessage),
    /// Show the persistent failure state
    ShowError { message: String },
    HideLoading,
}

/// Reconnect state machine for one panel instance
#[derive(Debug, Clone)]
pub struct ReconnectMachine {
    endpoint: Url,
    policy: ReconnectPolicy,
    state: ConnectionState,
    generation: u64,
    failures: u32,
    opened: bool,
}

impl ReconnectMachine {
    pub fn new(endpoint: Url, policy: ReconnectPolicy) -> Self {
        Self {
            endpoint,
            policy,
            state: ConnectionState::Loading,
            generation: 0,
            failures: 0,
            opened: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Generation of the current `Loading` entry
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Consecutive failed loads so far
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Apply `event` and return the actions it requires.
    ///
    /// Terminal states ignore every event.
    pub fn update(&mut self, event: SurfaceEvent) -> Vec<SurfaceAction> {
        if self.is_terminal() {
            trace!("ignoring {:?} in terminal state {}", event, self.state);
            return Vec::new();
        }

        match (self.state, event) {
            (ConnectionState::Loading, SurfaceEvent::Open) if !self.opened => {
                self.opened = true;
                self.enter_loading(self.endpoint.clone())
            }

            (ConnectionState::Loading | ConnectionState::Retrying { .. }, SurfaceEvent::Loaded)
                if self.opened =>
            {
                self.state = ConnectionState::Connected;
                vec![
                    SurfaceAction::CancelTimers,
                    SurfaceAction::HideLoading,
                    SurfaceAction::Notify(SurfaceMessage::iframe_loaded(
                        Utc::now().timestamp_millis(),
                    )),
                ]
            }

            (ConnectionState::Loading, SurfaceEvent::LoadFailed) if self.opened => {
                self.fail()
            }

            (ConnectionState::Loading, SurfaceEvent::LoadTimedOut { generation })
                if generation == self.generation =>
            {
                self.fail()
            }

            (ConnectionState::Retrying { attempt }, SurfaceEvent::RetryDue { generation })
                if generation == self.generation =>
            {
                let url = retry_url(&self.endpoint, attempt, Utc::now().timestamp_millis());
                self.enter_loading(url)
            }

            (state, event) => {
                trace!("ignoring {:?} in state {}", event, state);
                Vec::new()
            }
        }
    }

    fn enter_loading(&mut self, url: Url) -> Vec<SurfaceAction> {
        self.generation += 1;
        self.state = ConnectionState::Loading;
        vec![
            SurfaceAction::CancelTimers,
            SurfaceAction::Navigate { url },
            SurfaceAction::ArmLoadTimeout {
                generation: self.generation,
                after: self.policy.load_timeout,
            },
        ]
    }

    fn fail(&mut self) -> Vec<SurfaceAction> {
        self.failures += 1;
        let attempt = self.failures;

        if attempt < self.policy.max_retries {
            debug!(
                "surface load failed ({} of {}), retrying",
                attempt, self.policy.max_retries
            );
            self.state = ConnectionState::Retrying { attempt };
            vec![
                SurfaceAction::CancelTimers,
                SurfaceAction::ArmRetry {
                    generation: self.generation,
                    after: self.policy.retry_delay,
                },
            ]
        } else {
            self.state = ConnectionState::Failed;
            let error = Error::ConnectionRetriesExhausted { attempts: attempt };
            warn!("{}", error);
            vec![
                SurfaceAction::CancelTimers,
                SurfaceAction::ShowError {
                    message: format!("{}. Check the Sidecar diagnostics output.", error),
                },
            ]
        }
    }
}

/// `endpoint` with a cache-defeating `_sidecar_retry=<attempt>-<millis>` query
pub fn retry_url(endpoint: &Url, attempt: u32, now_millis: i64) -> Url {
    let mut url = endpoint.clone();
    url.query_pairs_mut()
        .append_pair(RETRY_QUERY_PARAM, &format!("{}-{}", attempt, now_millis));
    url
}
