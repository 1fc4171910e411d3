//! Sitemap crawl against a mock WordPress site

mod mock_site;

use std::collections::HashSet;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use loadstorm::errors::{IterationError, SetupError};
use loadstorm::runner::crawl_site_pages;
use loadstorm::{SessionContext, crawl};

use mock_site::{settings, xml};

async fn mount_index(server: &MockServer) {
    let uri = server.uri();
    let index = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>{uri}/wp-sitemap-posts-post-1.xml</loc></sitemap>
  <sitemap><loc>{uri}/wp-sitemap-users-1.xml</loc></sitemap>
  <sitemap><loc>{uri}/wp-sitemap-missing.xml</loc></sitemap>
</sitemapindex>"#
    );
    let posts = format!(
        r#"<urlset>
  <url><loc>{uri}/hello-world/</loc></url>
  <url><loc>{uri}/category/news/</loc></url>
  <url><loc>{uri}/sample-page/</loc></url>
</urlset>"#
    );
    let users = format!(r#"<urlset><url><loc>{uri}/author/admin/</loc></url></urlset>"#);

    Mock::given(method("GET"))
        .and(path("/wp-sitemap.xml"))
        .respond_with(xml(&index))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wp-sitemap-posts-post-1.xml"))
        .respond_with(xml(&posts))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wp-sitemap-users-1.xml"))
        .respond_with(xml(&users))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/wp-sitemap-missing.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_crawl_flattens_index() {
    let server = MockServer::start().await;
    mount_index(&server).await;

    let session = SessionContext::new(&settings(&server), HashSet::new()).unwrap();
    let urls = crawl(&session, &format!("{}/wp-sitemap.xml", server.uri()))
        .await
        .unwrap();

    let uri = server.uri();
    assert_eq!(
        urls,
        vec![
            format!("{uri}/hello-world/"),
            format!("{uri}/category/news/"),
            format!("{uri}/sample-page/"),
            format!("{uri}/author/admin/"),
        ]
    );
}

#[tokio::test]
async fn test_setup_crawl_removes_archives() {
    let server = MockServer::start().await;
    mount_index(&server).await;

    let pages = crawl_site_pages(&settings(&server)).await.unwrap();

    let uri = server.uri();
    assert_eq!(
        pages,
        vec![format!("{uri}/hello-world/"), format!("{uri}/sample-page/")]
    );
}

#[tokio::test]
async fn test_leaf_sitemap() {
    let server = MockServer::start().await;
    let uri = server.uri();
    Mock::given(method("GET"))
        .and(path("/wp-sitemap.xml"))
        .respond_with(xml(&format!(
            "<urlset><url><loc>{uri}/only/</loc></url></urlset>"
        )))
        .mount(&server)
        .await;

    let pages = crawl_site_pages(&settings(&server)).await.unwrap();
    assert_eq!(pages, vec![format!("{uri}/only/")]);
}

#[tokio::test]
async fn test_sitemap_not_found_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-sitemap.xml"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = crawl_site_pages(&settings(&server)).await.unwrap_err();
    assert!(matches!(err, SetupError::Setup(IterationError::Sitemap(_))));
}

#[tokio::test]
async fn test_sitemap_without_urls_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wp-sitemap.xml"))
        .respond_with(xml("<rss><channel><item>not a sitemap</item></channel></rss>"))
        .mount(&server)
        .await;

    let err = crawl_site_pages(&settings(&server)).await.unwrap_err();
    assert!(matches!(err, SetupError::Setup(IterationError::Sitemap(_))));
}
