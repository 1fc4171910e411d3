//! Virtual users
//!
//! A [`VirtualUser`] is the execution context of one scheduler iteration. It
//! owns a fresh [`SessionContext`] and borrows the run-wide [`SiteContext`]
//! and [`MetricsAggregator`]. Every action either returns normally or with an
//! [`IterationError`] that ends the iteration; failures that count against
//! the error rate are recorded before they are returned.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, trace};

use super::classifier::wp_metrics;
use super::http::{Exchange, RequestParams};
use super::login::Credentials;
use super::metrics::MetricsAggregator;
use super::products::{Product, cart_hash};
use super::session::{SessionContext, SessionSettings};
use crate::errors::{IterationError, IterationResult};
use crate::utils::unix_millis;

/// Default number of assets fetched concurrently per batch
pub const DEFAULT_ASSET_BATCH: usize = 20;

/// Immutable, run-wide data every VU reads
#[derive(Debug)]
pub struct SiteContext {
    pub settings: SessionSettings,
    /// Present for profiles that log in
    pub credentials: Option<Credentials>,
    /// WordPress login path relative to the site root
    pub wp_login: String,
    /// Pages produced by the setup sitemap crawl
    pub pages: Vec<String>,
    /// Upper bound on concurrent asset requests within one page load
    pub asset_batch: usize,
}

impl SiteContext {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            credentials: None,
            wp_login: "wp-login.php".to_string(),
            pages: Vec::new(),
            asset_batch: DEFAULT_ASSET_BATCH,
        }
    }

    pub fn credentials(&self) -> IterationResult<&Credentials> {
        self.credentials
            .as_ref()
            .ok_or_else(|| IterationError::LoginFailed {
                username: String::new(),
                reason: "no credentials configured".to_string(),
            })
    }
}

#[derive(Debug)]
pub struct VirtualUser {
    id: u64,
    iteration: u64,
    scenario: Arc<str>,
    session: SessionContext,
    site: Arc<SiteContext>,
    metrics: Arc<MetricsAggregator>,
}

impl VirtualUser {
    pub fn new(
        id: u64,
        iteration: u64,
        scenario: Arc<str>,
        site: Arc<SiteContext>,
        metrics: Arc<MetricsAggregator>,
        known_assets: HashSet<String>,
    ) -> IterationResult<Self> {
        let session = SessionContext::new(&site.settings, known_assets)?;
        Ok(Self {
            id,
            iteration,
            scenario,
            session,
            site,
            metrics,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    pub fn site(&self) -> &Arc<SiteContext> {
        &self.site
    }

    pub fn metrics(&self) -> &MetricsAggregator {
        &self.metrics
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionContext {
        &mut self.session
    }

    /// Release the session, keeping only its fetched-asset set
    pub fn into_assets(self) -> HashSet<String> {
        self.session.into_assets()
    }

    pub async fn pause(&self) {
        self.session.pause().await;
    }

    // =========================================================================
    // Raw requests (transport failures are recorded as errors)
    // =========================================================================

    pub async fn fetch(&self, url: &str, params: &RequestParams) -> IterationResult<Exchange> {
        self.session
            .get(url, params)
            .await
            .map_err(|e| self.metrics.record_error(e))
    }

    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        params: &RequestParams,
    ) -> IterationResult<Exchange> {
        self.session
            .post_form(url, form, params)
            .await
            .map_err(|e| self.metrics.record_error(e))
    }

    // =========================================================================
    // Page actions
    // =========================================================================

    /// GET a page, require 200, record it, then fetch its new assets
    pub async fn get_page(&mut self, url: &str) -> IterationResult<Exchange> {
        let page = self.fetch(url, &RequestParams::default()).await?;
        self.metrics.expect_status(&page, 200)?;
        self.metrics.record(&page);

        if let Some(values) = wp_metrics(&page.body) {
            self.metrics.record_object_cache(&values);
        }

        self.get_page_assets(&page).await?;
        Ok(page)
    }

    /// Fetch assets referenced by `page` that this session has not seen yet
    ///
    /// Requests go out in concurrent batches; each batch is joined before the
    /// next starts. Results are checked in document order and the first
    /// failure (transport or non-200) is recorded once and aborts the
    /// iteration. Returns how many assets were fetched.
    pub async fn get_page_assets(&mut self, page: &Exchange) -> IterationResult<usize> {
        let fresh = self
            .site
            .settings
            .assets
            .discover_new(&page.body, self.session.known_assets());
        if fresh.is_empty() {
            return Ok(0);
        }
        trace!(vu = self.id, page = %page.url, count = fresh.len(), "fetching new assets");

        let params = RequestParams::default();
        for batch in fresh.chunks(self.site.asset_batch.max(1)) {
            let responses =
                join_all(batch.iter().map(|url| self.session.get(url, &params))).await;
            for response in responses {
                let asset = response.map_err(|e| self.metrics.record_error(e))?;
                self.metrics.expect_status(&asset, 200)?;
                self.metrics.record(&asset);
            }
        }

        let count = fresh.len();
        self.session.merge_assets(fresh);
        Ok(count)
    }

    /// POST the WooCommerce refreshed-fragments endpoint
    pub async fn refreshed_fragments(&self) -> IterationResult<Exchange> {
        let url = self.site.settings.url("?wc-ajax=get_refreshed_fragments");
        let time = unix_millis().to_string();
        let params = RequestParams::form().with_accept("*/*");

        let response = self.post_form(&url, &[("time", time.as_str())], &params).await?;
        self.metrics.expect_status(&response, 200)?;
        self.metrics.record(&response);
        Ok(response)
    }

    /// POST the WooCommerce add-to-cart endpoint
    ///
    /// Requires 200 and a JSON body with a non-empty `cart_hash`.
    pub async fn add_to_cart(&self, product: &Product, quantity: u32) -> IterationResult<Exchange> {
        let url = self.site.settings.url("?wc-ajax=add_to_cart");
        let quantity = quantity.to_string();
        let form = [
            ("product_sku", product.sku.as_str()),
            ("product_id", product.id.as_str()),
            ("quantity", quantity.as_str()),
        ];

        let response = self
            .post_form(&url, &form, &RequestParams::form())
            .await?;
        self.metrics.expect_status(&response, 200)?;
        self.metrics.record_cart_time(&response);

        if cart_hash(&response).is_none() {
            self.metrics.record_cart_failure();
            return Err(IterationError::CartFailed(format!(
                "no cart_hash for product {}",
                product.id
            )));
        }
        debug!(vu = self.id, product = %product.id, "Added to cart");
        Ok(response)
    }
}
