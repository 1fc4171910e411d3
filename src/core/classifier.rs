//! Response classification
//!
//! Turns a completed [`Exchange`] into a [`MetricRecord`]: was it served from
//! an intermediary cache, is it a page or an asset, and did it fail.
//!
//! Cache detection walks [`CACHE_SIGNALS`] in priority order. Supporting a new
//! CDN means adding a row to that table.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::header::{CONTENT_TYPE, HeaderMap};

use super::http::Exchange;

/// A response header whose value reports a cache hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSignal {
    /// Header name (lowercase)
    pub header: &'static str,
    /// Value meaning "hit", compared case-insensitively
    pub hit_value: &'static str,
    /// Who emits it
    pub vendor: &'static str,
}

/// Known cache/CDN hit signals, highest priority first
pub const CACHE_SIGNALS: &[CacheSignal] = &[
    CacheSignal {
        header: "cf-cache-status",
        hit_value: "hit",
        vendor: "Cloudflare",
    },
    CacheSignal {
        header: "x-proxy-cache",
        hit_value: "hit",
        vendor: "Generic proxy",
    },
    CacheSignal {
        header: "x-lsadc-cache",
        hit_value: "hit",
        vendor: "LiteSpeed",
    },
    CacheSignal {
        header: "x-cache",
        hit_value: "hit",
        vendor: "Fastly / KeyCDN / Akamai",
    },
    CacheSignal {
        header: "x-cache-status",
        hit_value: "hit",
        vendor: "WPX CDN",
    },
    CacheSignal {
        header: "cache",
        hit_value: "hit",
        vendor: "Gcore CDN",
    },
];

/// Page vs. static asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentCategory {
    Page,
    Asset,
}

/// Classified outcome of one exchange
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricRecord {
    pub is_error: bool,
    pub is_cache_hit: bool,
    pub category: ContentCategory,
    pub duration: Duration,
}

impl MetricRecord {
    pub fn duration_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }
}

/// The first matching cache signal, if any
pub fn cache_signal(headers: &HeaderMap) -> Option<&'static CacheSignal> {
    CACHE_SIGNALS.iter().find(|signal| {
        headers.get_all(signal.header).iter().any(|value| {
            value
                .to_str()
                .map(|v| v.trim().eq_ignore_ascii_case(signal.hit_value))
                .unwrap_or(false)
        })
    })
}

/// Whether any known cache/CDN header reports a hit
pub fn response_was_cached(headers: &HeaderMap) -> bool {
    cache_signal(headers).is_some()
}

/// `Page` when the content type mentions `text/html`, otherwise `Asset`
///
/// Header names are matched case-insensitively, so `Content-Type` and
/// `content-type` are treated alike.
pub fn content_category(headers: &HeaderMap) -> ContentCategory {
    let is_html = headers
        .get_all(CONTENT_TYPE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.to_ascii_lowercase().contains("text/html"));

    if is_html {
        ContentCategory::Page
    } else {
        ContentCategory::Asset
    }
}

/// Classify an exchange against the status the calling flow expects
pub fn classify(exchange: &Exchange, expected_status: u16) -> MetricRecord {
    MetricRecord {
        is_error: exchange.status != expected_status,
        is_cache_hit: response_was_cached(&exchange.headers),
        category: content_category(&exchange.headers),
        duration: exchange.duration,
    }
}

static OBJECT_CACHE_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!-- plugin=object-cache-pro (.+?) -->").unwrap_or_else(|e| panic!("{e}"))
});
static OBJECT_CACHE_METRIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"metric#([\w-]+)=([\d.]+)").unwrap_or_else(|e| panic!("{e}")));

/// Parse the Object Cache Pro metrics comment from a page body
///
/// `<!-- plugin=object-cache-pro metric#hits=12 metric#ms-total=1.5 -->`
/// yields `{"hits": "12", "msTotal": "1.5"}`. Returns `None` when the comment
/// is absent.
pub fn wp_metrics(body: &str) -> Option<HashMap<String, String>> {
    let comment = OBJECT_CACHE_COMMENT.find(body)?;

    Some(
        OBJECT_CACHE_METRIC
            .captures_iter(comment.as_str())
            .map(|caps| (camel_case(&caps[1]), caps[2].to_string()))
            .collect(),
    )
}

fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.to_lowercase().chars() {
        if ch == '\'' || ch == '"' {
            continue;
        }
        if !ch.is_alphanumeric() && ch != '_' {
            upper_next = !out.is_empty();
            continue;
        }
        if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}
