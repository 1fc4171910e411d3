//! HTTP exchange primitives
//!
//! An [`Exchange`] is a completed request/response pair, fully buffered so it
//! can be inspected synchronously (markup parsing, header classification)
//! without holding any non-`Send` parse tree across an await point.
//!
//! Per-request headers are layered onto the session defaults with
//! [`merge_headers`]: defaults first, then each named override in a fixed order.

use std::time::{Duration, Instant};

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, REFERER};
use tracing::trace;

/// Form content type used by WordPress/WooCommerce endpoints
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// A completed HTTP exchange
#[derive(Debug, Clone)]
pub struct Exchange {
    /// Final URL (after redirects)
    pub url: String,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
    /// Time from sending the request until the body was fully received
    pub duration: Duration,
}

impl Exchange {
    /// Build an exchange from already-known parts
    pub fn new(
        url: impl Into<String>,
        status: u16,
        headers: HeaderMap,
        body: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            url: url.into(),
            status,
            headers,
            body: body.into(),
            duration,
        }
    }

    /// Buffer a reqwest response into an exchange
    pub async fn from_response(
        response: reqwest::Response,
        started: Instant,
    ) -> Result<Self, reqwest::Error> {
        let url = response.url().to_string();
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;
        let duration = started.elapsed();

        trace!(url = %url, status, ms = duration.as_millis() as u64, "exchange complete");

        Ok(Self {
            url,
            status,
            headers,
            body,
            duration,
        })
    }

    /// Header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body parsed as JSON, `None` when it is not JSON
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }

    /// Duration in fractional milliseconds
    pub fn duration_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }
}

/// Named per-request header overrides
#[derive(Debug, Clone, Default)]
pub struct RequestParams {
    pub content_type: Option<String>,
    pub referer: Option<String>,
    pub accept: Option<String>,
    /// Additional headers, applied last in declaration order
    pub extra: Vec<(String, String)>,
}

impl RequestParams {
    /// Form-encoded POST params
    pub fn form() -> Self {
        Self {
            content_type: Some(FORM_URLENCODED.to_string()),
            ..Default::default()
        }
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((name.into(), value.into()));
        self
    }
}

/// Merge request overrides onto session defaults
///
/// Order: defaults, then `content-type`, `referer`, `accept`, then `extra`.
/// A later entry replaces an earlier one with the same (case-insensitive) name.
/// Invalid names or values in the overrides are skipped.
pub fn merge_headers(defaults: &HeaderMap, overrides: &RequestParams) -> HeaderMap {
    let mut merged = defaults.clone();

    let named = [
        (CONTENT_TYPE, overrides.content_type.as_deref()),
        (REFERER, overrides.referer.as_deref()),
        (reqwest::header::ACCEPT, overrides.accept.as_deref()),
    ];
    for (name, value) in named {
        if let Some(value) = value.and_then(|v| HeaderValue::from_str(v).ok()) {
            merged.insert(name, value);
        }
    }

    for (name, value) in &overrides.extra {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) else {
            continue;
        };
        merged.insert(name, value);
    }

    merged
}
