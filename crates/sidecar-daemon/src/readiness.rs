//! Readiness detection
//!
//! Three non-exclusive signals decide when the helper may be connected to:
//!
//! 1. **Output marker** - a stdout line matches the startup banner
//! 2. **Network probe** - after a warm-up delay, one HTTP request to the endpoint answers
//! 3. **Timeout leniency** - the leniency window elapses while the process is still alive
//!
//! The first signal to fire wins; later signals are ignored. Leniency trades a
//! confirmed health check for bounded startup latency, relying on the embedded
//! surface's own reconnect logic when the helper is not actually serving yet.

use std::time::Duration;

use regex::Regex;
use url::Url;

use sidecar_core::{ReadinessResult, ReadinessSignal};

use crate::probe::ProbeOutcome;

/// Banner the bundled helper prints once it is listening
pub const DEFAULT_MARKER_PATTERN: &str = r"Starting server on http://localhost:\d+";

/// Startup banner matcher
#[derive(Debug, Clone)]
pub struct OutputMarker {
    pattern: Regex,
}

impl OutputMarker {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn matches(&self, line: &str) -> bool {
        self.pattern.is_match(line)
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

impl Default for OutputMarker {
    fn default() -> Self {
        Self {
            pattern: Regex::new(DEFAULT_MARKER_PATTERN).expect("default marker pattern is valid"),
        }
    }
}

/// Readiness timing and targets for one supervisor
#[derive(Debug, Clone)]
pub struct ReadinessConfig {
    pub marker: OutputMarker,
    /// Delay from spawn before the network probe is issued
    pub warmup: Duration,
    /// Timeout of the single probe request
    pub probe_timeout: Duration,
    /// Time from spawn after which a live process is assumed ready
    pub leniency_window: Duration,
    pub probe_url: Url,
}

impl ReadinessConfig {
    pub fn new(probe_url: Url) -> Self {
        Self {
            marker: OutputMarker::default(),
            warmup: Duration::from_millis(500),
            probe_timeout: Duration::from_millis(1000),
            leniency_window: Duration::from_millis(3000),
            probe_url,
        }
    }
}

/// First-signal-wins readiness decision for one start attempt
#[derive(Debug)]
pub struct ReadinessProber {
    marker: OutputMarker,
    decided: Option<ReadinessResult>,
    abandoned: bool,
}

impl ReadinessProber {
    pub fn new(marker: OutputMarker) -> Self {
        Self {
            marker,
            decided: None,
            abandoned: false,
        }
    }

    /// True once a signal fired or the attempt was abandoned
    pub fn is_settled(&self) -> bool {
        self.decided.is_some() || self.abandoned
    }

    pub fn result(&self) -> Option<ReadinessResult> {
        self.decided
    }

    /// Feed a stdout line. Returns the result if this line decided readiness.
    pub fn observe_line(&mut self, line: &str) -> Option<ReadinessResult> {
        if self.is_settled() || !self.marker.matches(line) {
            return None;
        }
        self.decide(ReadinessSignal::OutputMarker)
    }

    /// Feed the network probe outcome. Returns the result if it decided readiness.
    pub fn observe_probe(&mut self, outcome: &ProbeOutcome) -> Option<ReadinessResult> {
        if self.is_settled() || !outcome.is_reachable() {
            return None;
        }
        self.decide(ReadinessSignal::NetworkProbe)
    }

    /// The leniency window elapsed. Readiness is assumed if the process is alive.
    pub fn observe_leniency_elapsed(&mut self, process_alive: bool) -> Option<ReadinessResult> {
        if self.is_settled() || !process_alive {
            return None;
        }
        self.decide(ReadinessSignal::TimeoutLeniency)
    }

    /// The process exited. Returns `true` if readiness had not been reached.
    pub fn observe_exit(&mut self) -> bool {
        if self.is_settled() {
            return false;
        }
        self.abandoned = true;
        true
    }

    fn decide(&mut self, signal: ReadinessSignal) -> Option<ReadinessResult> {
        let result = ReadinessResult::via(signal);
        self.decided = Some(result);
        Some(result)
    }
}
