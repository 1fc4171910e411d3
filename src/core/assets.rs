//! Asset discovery and deduplication
//!
//! Finds stylesheets, scripts and images referenced by a page, normalises them
//! to https, drops excluded domains and anything the session already fetched.
//! Discovery is one level deep: assets referenced from CSS or JS are not followed.
//!
//! Everything here is a pure function over its inputs. Merging the discovered
//! URLs back into the session's known set after fetching is the caller's job.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::trace;

static STYLESHEETS: LazyLock<Selector> = LazyLock::new(|| selector("link[rel='stylesheet']"));
static SCRIPTS: LazyLock<Selector> = LazyLock::new(|| selector("script"));
static IMAGES: LazyLock<Selector> = LazyLock::new(|| selector("img"));

pub(crate) fn selector(css: &str) -> Selector {
    // Only called with literal selectors defined in this crate
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css:?}: {e}"))
}

/// Normalise an asset reference to https
///
/// - `https://…` passes through unchanged
/// - `http://…` is upgraded to `https://…`
/// - protocol-relative `//host/…` gets an `https:` prefix
/// - anything else (relative paths, data URIs, garbage) returns `None`
pub fn check_https_protocol(url: &str) -> Option<String> {
    if url.starts_with("https://") {
        Some(url.to_string())
    } else if let Some(rest) = url.strip_prefix("http://") {
        Some(format!("https://{rest}"))
    } else if url.starts_with("//") {
        Some(format!("https:{url}"))
    } else {
        None
    }
}

/// Strip a WordPress `?ver=` cache-busting suffix
pub fn filter_versions(url: &str) -> &str {
    match url.find("?ver=") {
        Some(idx) => &url[..idx],
        None => url,
    }
}

/// Remove every asset containing any of the excluded domain strings
///
/// Substring match, not a parsed-host comparison.
pub fn filter_domains(assets: Vec<String>, exclusions: &[String]) -> Vec<String> {
    assets
        .into_iter()
        .filter(|asset| !exclusions.iter().any(|domain| asset.contains(domain.as_str())))
        .collect()
}

/// Collect normalised asset URLs from a parsed document, in document order
///
/// Stylesheets first, then scripts, then images. References that cannot be
/// normalised are skipped.
pub fn find_assets(doc: &Html) -> Vec<String> {
    let stylesheets = doc
        .select(&STYLESHEETS)
        .filter_map(|el| el.value().attr("href"));
    let scripts = doc.select(&SCRIPTS).filter_map(|el| el.value().attr("src"));
    let images = doc.select(&IMAGES).filter_map(|el| el.value().attr("src"));

    stylesheets
        .chain(scripts)
        .chain(images)
        .filter_map(|raw| {
            let normalised = check_https_protocol(raw.trim());
            if normalised.is_none() {
                trace!(reference = raw, "skipping non-absolute asset reference");
            }
            normalised
        })
        .collect()
}

/// Assets in `page_body` that are not in `known` and not excluded
///
/// The result holds no duplicates and preserves first-seen order.
pub fn discover_new(page_body: &str, known: &HashSet<String>, exclusions: &[String]) -> Vec<String> {
    AssetIndex::new(exclusions.to_vec(), false).discover_new(page_body, known)
}

/// Asset discovery settings shared by every VU of a run
#[derive(Debug, Clone, Default)]
pub struct AssetIndex {
    domain_filter: Vec<String>,
    strip_versions: bool,
}

impl AssetIndex {
    pub fn new(domain_filter: Vec<String>, strip_versions: bool) -> Self {
        Self {
            domain_filter,
            strip_versions,
        }
    }

    pub fn domain_filter(&self) -> &[String] {
        &self.domain_filter
    }

    /// New assets referenced by `page_body`, given the already-known set
    pub fn discover_new(&self, page_body: &str, known: &HashSet<String>) -> Vec<String> {
        let doc = Html::parse_document(page_body);
        let mut found = find_assets(&doc);

        if self.strip_versions {
            found = found
                .into_iter()
                .map(|url| filter_versions(&url).to_string())
                .collect();
        }

        let mut seen = HashSet::new();
        let fresh = found
            .into_iter()
            .filter(|url| !known.contains(url) && seen.insert(url.clone()))
            .collect();

        filter_domains(fresh, &self.domain_filter)
    }
}
