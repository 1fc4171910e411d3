//! Site URL helpers

use url::Url;

/// Make sure the site URL ends with a trailing slash so relative paths can be appended
pub fn ensure_trailing_slash(site_url: &str) -> String {
    if site_url.ends_with('/') {
        site_url.to_string()
    } else {
        format!("{site_url}/")
    }
}

/// Resolve `href` against `base`, returning `None` for unusable references
pub fn resolve(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    base.join(href).ok().map(String::from)
}

/// Current time as unix milliseconds, used for cache-busting form parameters
pub fn unix_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
