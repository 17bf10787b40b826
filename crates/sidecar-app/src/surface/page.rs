//! HTML document for the embedded surface
//!
//! The page hosts the helper endpoint in a sandboxed iframe and runs the same
//! reconnect state machine as [`crate::reconnect::ReconnectMachine`] in an
//! inline script, reporting `iframe-loaded` to the host once connected.

use url::Url;

use crate::config::SurfaceSettings;
use crate::reconnect::RETRY_QUERY_PARAM;

const PAGE_TEMPLATE: &str = include_str!("page.html");

/// Default document title
pub const PAGE_TITLE: &str = "Sidecar";

/// Render the surface page targeting `endpoint`
pub fn render_page(settings: &SurfaceSettings, endpoint: &Url) -> String {
    render_page_titled(settings, endpoint, PAGE_TITLE)
}

pub fn render_page_titled(settings: &SurfaceSettings, endpoint: &Url, title: &str) -> String {
    PAGE_TEMPLATE
        .replace("{{ORIGIN}}", &endpoint.origin().ascii_serialization())
        .replace("{{TITLE}}", &escape_html(title))
        .replace("{{ENDPOINT_JSON}}", &js_string(endpoint.as_str()))
        .replace("{{LOAD_TIMEOUT_MS}}", &settings.load_timeout_ms.to_string())
        .replace("{{RETRY_DELAY_MS}}", &settings.retry_delay_ms.to_string())
        .replace("{{MAX_RETRIES}}", &settings.max_retries.to_string())
        .replace("{{RETRY_PARAM_JSON}}", &js_string(RETRY_QUERY_PARAM))
}

/// A JSON string literal that is also safe inside an inline `<script>`
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string())
        .to_string()
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
