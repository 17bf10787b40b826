//! Domain event definitions

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Message type sent by the embedded surface once the endpoint has loaded
pub const IFRAME_LOADED: &str = "iframe-loaded";

// ─────────────────────────────────────────────────────────
// Helper process events
// ─────────────────────────────────────────────────────────

/// Events observed on the helper child process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// A line on the helper's standard output
    Stdout(String),

    /// A line on the helper's standard error
    Stderr(String),

    /// The helper exited. `signal` is only populated on unix.
    Exited {
        code: Option<i32>,
        signal: Option<i32>,
    },
}

// ─────────────────────────────────────────────────────────
// Surface -> host messages
// ─────────────────────────────────────────────────────────

/// Wire shape shared by every surface message.
///
/// `timestamp` is left untyped here; only `iframe-loaded` requires an integer.
#[derive(Debug, Deserialize, Serialize)]
struct RawSurfaceMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<Value>,
}

/// One-way message from the embedded surface to the host.
///
/// The contract is open: any `type` is accepted, only `iframe-loaded` is
/// acted upon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceMessage {
    /// The endpoint finished loading inside the surface
    IframeLoaded { timestamp: i64 },

    /// Any other message type, its timestamp kept as sent
    Other {
        kind: String,
        timestamp: Option<Value>,
    },
}

impl SurfaceMessage {
    pub fn iframe_loaded(timestamp: i64) -> Self {
        Self::IframeLoaded { timestamp }
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::IframeLoaded { .. } => IFRAME_LOADED,
            Self::Other { kind, .. } => kind,
        }
    }

    /// Parse a message posted by the surface
    pub fn parse(json: &str) -> Result<Self> {
        let raw: RawSurfaceMessage = serde_json::from_str(json)?;
        match (raw.kind.as_str(), &raw.timestamp) {
            (IFRAME_LOADED, Some(value)) => value
                .as_i64()
                .map(|timestamp| Self::IframeLoaded { timestamp })
                .ok_or_else(|| Error::surface("iframe-loaded timestamp must be an integer")),
            (IFRAME_LOADED, None) => Err(Error::surface("iframe-loaded without timestamp")),
            _ => Ok(Self::Other {
                kind: raw.kind,
                timestamp: raw.timestamp,
            }),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        let raw = match self {
            Self::IframeLoaded { timestamp } => RawSurfaceMessage {
                kind: IFRAME_LOADED.to_string(),
                timestamp: Some(Value::from(*timestamp)),
            },
            Self::Other { kind, timestamp } => RawSurfaceMessage {
                kind: kind.clone(),
                timestamp: timestamp.clone(),
            },
        };
        Ok(serde_json::to_string(&raw)?)
    }
}
