//! Network reachability probe for the helper endpoint

use std::time::Duration;

use url::Url;

use sidecar_core::prelude::*;

/// Result of a single probe request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The endpoint answered; any status code counts
    Reachable { status: u16 },
    /// No answer within the timeout
    TimedOut,
    /// Connection refused, reset, or similar
    Unreachable { reason: String },
}

impl ProbeOutcome {
    pub fn is_reachable(&self) -> bool {
        matches!(self, ProbeOutcome::Reachable { .. })
    }
}

/// A single bounded-timeout reachability check
#[trait_variant::make(EndpointProbe: Send)]
pub trait LocalEndpointProbe {
    async fn probe(&self, url: &Url, timeout: Duration) -> ProbeOutcome;
}

/// HTTP probe backed by `reqwest`.
///
/// Proxies are disabled: the endpoint is always on the loopback interface.
#[derive(Debug, Clone, Default)]
pub struct HttpProbe;

impl EndpointProbe for HttpProbe {
    async fn probe(&self, url: &Url, timeout: Duration) -> ProbeOutcome {
        let client = match reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                warn!("Failed to build probe client: {}", e);
                return ProbeOutcome::Unreachable {
                    reason: e.to_string(),
                };
            }
        };

        match client.get(url.clone()).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                debug!("Probe of {} answered with {}", url, status);
                ProbeOutcome::Reachable { status }
            }
            Err(e) if e.is_timeout() => {
                debug!("Probe of {} timed out after {:?}", url, timeout);
                ProbeOutcome::TimedOut
            }
            Err(e) => {
                debug!("Probe of {} failed: {}", url, e);
                ProbeOutcome::Unreachable {
                    reason: e.to_string(),
                }
            }
        }
    }
}
