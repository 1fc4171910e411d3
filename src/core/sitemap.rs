//! Sitemap crawling
//!
//! Runs once during setup to produce the page list browsing actions visit.
//! One level of index indirection is followed: `<sitemap><loc>` entries are
//! fetched and their `<url><loc>` entries flattened into the result, followed
//! by any `<url><loc>` entries on the top-level document itself.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::{debug, warn};

use super::assets::selector;
use super::http::RequestParams;
use super::session::SessionContext;
use crate::errors::{IterationError, IterationResult};

static SITEMAP_LOCS: LazyLock<Selector> = LazyLock::new(|| selector("sitemap loc"));
static URL_LOCS: LazyLock<Selector> = LazyLock::new(|| selector("url loc"));

/// Default WordPress core sitemap path
pub const WP_SITEMAP_PATH: &str = "wp-sitemap.xml";

/// `<loc>` entries of one sitemap document
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SitemapDocument {
    /// Sub-sitemaps listed by an index
    pub sitemaps: Vec<String>,
    /// Page URLs
    pub urls: Vec<String>,
}

/// Extract sub-sitemap and page locations from a sitemap body
pub fn parse_sitemap(body: &str) -> SitemapDocument {
    let doc = Html::parse_document(body);
    let locs = |sel: &Selector| -> Vec<String> {
        doc.select(sel)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|loc| !loc.is_empty())
            .collect()
    };

    SitemapDocument {
        sitemaps: locs(&SITEMAP_LOCS),
        urls: locs(&URL_LOCS),
    }
}

/// Drop author and category archive links, leaving posts and pages
pub fn remove_author_category_links(urls: Vec<String>) -> Vec<String> {
    urls.into_iter()
        .filter(|url| !url.contains("/author/") && !url.contains("/category/"))
        .collect()
}

/// Fetch a sitemap (or sitemap index) and flatten it into page URLs
///
/// Fails when the top-level fetch is not 200 or nothing was found.
/// Sub-sitemaps that do not return 200 are skipped.
pub async fn crawl(session: &SessionContext, sitemap_url: &str) -> IterationResult<Vec<String>> {
    let params = RequestParams::default();
    let index = session.get(sitemap_url, &params).await?;

    if index.status != 200 {
        return Err(IterationError::Sitemap(format!(
            "{sitemap_url} did *not* return 200 status (got {})",
            index.status
        )));
    }

    let top = parse_sitemap(&index.body);
    let mut urls = Vec::new();

    for sub_url in &top.sitemaps {
        let sub = session.get(sub_url, &params).await?;
        if sub.status != 200 {
            warn!(url = %sub_url, status = sub.status, "Skipping sub-sitemap");
            continue;
        }
        let found = parse_sitemap(&sub.body).urls;
        debug!(url = %sub_url, count = found.len(), "Sub-sitemap parsed");
        urls.extend(found);
    }
    urls.extend(top.urls);

    if urls.is_empty() {
        return Err(IterationError::Sitemap(format!(
            "{sitemap_url} did *not* contain any urls"
        )));
    }

    Ok(urls)
}
