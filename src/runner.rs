//! Test run orchestration
//!
//! Setup runs once before any scenario starts: it builds the shared site
//! context and, when a scenario browses the sitemap, crawls it. A setup
//! failure halts the run. The scheduler then drives every scenario and the
//! final metrics snapshot is returned.
//!
//! ```rust,no_run
//! use loadstorm::config::LoadTestConfig;
//! use loadstorm::runner::Runner;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LoadTestConfig::from_env()?;
//! let summary = Runner::new(config).run().await?;
//! println!("error rate: {:.2}%", summary.errors.rate * 100.0);
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::LoadTestConfig;
use crate::core::sitemap::WP_SITEMAP_PATH;
use crate::core::{
    MetricsAggregator, MetricsSnapshot, SessionContext, SessionSettings, SiteContext, crawl,
    remove_author_category_links,
};
use crate::errors::SetupResult;
use crate::scheduler::{DEFAULT_TICK, ScenarioScheduler};

/// Crawl `wp-sitemap.xml` and keep post/page URLs only
pub async fn crawl_site_pages(settings: &SessionSettings) -> SetupResult<Vec<String>> {
    let session = SessionContext::new(settings, HashSet::new())?;
    let sitemap_url = settings.url(WP_SITEMAP_PATH);

    let urls = crawl(&session, &sitemap_url).await?;
    let pages = remove_author_category_links(urls);
    info!(sitemap = %sitemap_url, pages = pages.len(), "Sitemap crawled");
    Ok(pages)
}

/// Build the shared site context, crawling the sitemap when needed
pub async fn setup(config: &LoadTestConfig) -> SetupResult<SiteContext> {
    let mut site = config.site_context()?;
    if config.needs_sitemap() {
        site.pages = crawl_site_pages(&site.settings).await?;
    }
    Ok(site)
}

/// One complete load test
pub struct Runner {
    config: LoadTestConfig,
    metrics: Arc<MetricsAggregator>,
    shutdown: CancellationToken,
    tick: std::time::Duration,
}

impl Runner {
    pub fn new(config: LoadTestConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(MetricsAggregator::new()),
            shutdown: CancellationToken::new(),
            tick: DEFAULT_TICK,
        }
    }

    /// Controller tick used by every scenario
    pub fn with_tick(mut self, tick: std::time::Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Cancelling this token ends the run early; the summary is still produced
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn metrics(&self) -> &Arc<MetricsAggregator> {
        &self.metrics
    }

    pub async fn run(&self) -> SetupResult<MetricsSnapshot> {
        let site = Arc::new(setup(&self.config).await?);

        info!(
            profile = %self.config.profile,
            site = %self.config.site_url,
            scenarios = self.config.scenarios.len(),
            "Starting load test"
        );

        let scheduler = ScenarioScheduler::new(
            self.config.scenario_configs(),
            site,
            Arc::clone(&self.metrics),
        )
        .with_tick(self.tick)
        .with_shutdown(self.shutdown.clone());

        scheduler.run().await;

        let snapshot = self.metrics.snapshot();
        info!(
            errors = snapshot.error_counter,
            elapsed_secs = snapshot.elapsed_secs,
            "Load test finished"
        );
        Ok(snapshot)
    }
}
