//! Per-VU session state
//!
//! A [`SessionContext`] owns everything one virtual user mutates while it
//! runs an iteration: its HTTP client and cookie jar, and the set of assets
//! it has already fetched. It is never shared between VUs, so nothing in it
//! needs locking.
//!
//! [`SessionSettings`] is the immutable, run-wide template every session is
//! built from.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use reqwest::Client;
use reqwest::cookie::Jar;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use tracing::trace;
use url::Url;

use super::assets::AssetIndex;
use super::http::{Exchange, RequestParams, merge_headers};
use crate::errors::{ConfigError, IterationResult};

/// Cookies that make page caches treat the visitor as logged in
pub const BYPASS_CACHE_COOKIES: &[(&str, &str)] = &[
    ("comment_author_D00D2BAD", "FEEDFACE"),
    ("wordpress_logged_in_DEADFA11", "FADEDEAD"),
    ("woocommerce_cart_hash", "3405691582"),
    ("wp_woocommerce_session_BADC0FFEE0DDF00D", "DEADBEEF"),
];

/// Think-time bounds between actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub min: Duration,
    pub max: Duration,
}

impl Pacing {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// Fixed pause of `d`
    pub fn fixed(d: Duration) -> Self {
        Self { min: d, max: d }
    }

    /// Uniform draw from `[min, max]`
    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let secs = rand::rng().random_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }

    /// Suspend the calling task for a sampled think-time
    pub async fn pause(&self) {
        let wait = self.sample();
        trace!(ms = wait.as_millis() as u64, "pausing");
        tokio::time::sleep(wait).await;
    }
}

/// What happens to a VU's fetched-asset set between iterations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetRetention {
    /// Every iteration starts with an empty set
    #[default]
    Iteration,
    /// The set carries over to the next iteration of the same VU slot
    #[serde(alias = "vu")]
    VirtualUser,
}

impl FromStr for AssetRetention {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "iteration" => Ok(Self::Iteration),
            "vu" | "virtual_user" => Ok(Self::VirtualUser),
            other => Err(ConfigError::InvalidValue {
                name: "ASSET_RETENTION",
                reason: format!("expected 'iteration' or 'vu', got '{other}'"),
            }),
        }
    }
}

/// Run-wide settings shared by every session
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Site root, always ending in `/`
    pub site: Url,
    /// Headers sent with every request
    pub headers: HeaderMap,
    pub pacing: Pacing,
    /// Pre-seed every jar with [`BYPASS_CACHE_COOKIES`]
    pub bypass_cache: bool,
    pub assets: AssetIndex,
    pub retention: AssetRetention,
    /// Per-request timeout
    pub timeout: Duration,
    /// Accept self-signed or otherwise invalid certificates (staging sites)
    pub insecure_tls: bool,
}

impl SessionSettings {
    pub fn new(site: Url) -> Self {
        Self {
            site,
            headers: HeaderMap::new(),
            pacing: Pacing::fixed(Duration::ZERO),
            bypass_cache: false,
            assets: AssetIndex::default(),
            retention: AssetRetention::default(),
            timeout: Duration::from_secs(60),
            insecure_tls: false,
        }
    }

    /// Join a path onto the site root
    pub fn url(&self, path: &str) -> String {
        self.site
            .join(path)
            .map(String::from)
            .unwrap_or_else(|_| format!("{}{}", self.site, path))
    }
}

/// One VU's mutable HTTP state
#[derive(Debug)]
pub struct SessionContext {
    client: Client,
    jar: Arc<Jar>,
    headers: HeaderMap,
    pacing: Pacing,
    assets: HashSet<String>,
}

impl SessionContext {
    /// Fresh session with its own client and cookie jar
    ///
    /// `known_assets` seeds the fetched-asset set (empty unless assets are
    /// retained across iterations).
    pub fn new(settings: &SessionSettings, known_assets: HashSet<String>) -> IterationResult<Self> {
        let jar = Arc::new(Jar::default());
        if settings.bypass_cache {
            seed_bypass_cookies(&jar, &settings.site);
        }

        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(settings.insecure_tls)
            .build()?;

        Ok(Self {
            client,
            jar,
            headers: settings.headers.clone(),
            pacing: settings.pacing,
            assets: known_assets,
        })
    }

    pub async fn get(&self, url: &str, params: &RequestParams) -> IterationResult<Exchange> {
        let started = Instant::now();
        let response = self
            .client
            .get(url)
            .headers(merge_headers(&self.headers, params))
            .send()
            .await?;
        Ok(Exchange::from_response(response, started).await?)
    }

    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        params: &RequestParams,
    ) -> IterationResult<Exchange> {
        let started = Instant::now();
        let response = self
            .client
            .post(url)
            .headers(merge_headers(&self.headers, params))
            .form(form)
            .send()
            .await?;
        Ok(Exchange::from_response(response, started).await?)
    }

    pub fn jar(&self) -> &Arc<Jar> {
        &self.jar
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    pub async fn pause(&self) {
        self.pacing.pause().await;
    }

    pub fn known_assets(&self) -> &HashSet<String> {
        &self.assets
    }

    /// Remember assets as fetched; the set only grows
    pub fn merge_assets(&mut self, fetched: impl IntoIterator<Item = String>) {
        self.assets.extend(fetched);
    }

    /// Hand the fetched-asset set back for reuse by the next iteration
    pub fn into_assets(self) -> HashSet<String> {
        self.assets
    }
}

/// Add the cache-bypass cookies to `jar` for `site`
pub fn seed_bypass_cookies(jar: &Jar, site: &Url) {
    for (name, value) in BYPASS_CACHE_COOKIES {
        jar.add_cookie_str(&format!("{name}={value}; Path=/"), site);
    }
}
