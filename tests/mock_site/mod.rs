//! Mock WordPress / WooCommerce site
//!
//! Thin helpers around `wiremock` so each test only mounts the pages it
//! exercises. Every VU built here has zero pacing so flows run instantly.
//!
//! Asset references are upgraded to https before they are fetched, so
//! [`AssetServer`] serves them over TLS with a self-signed certificate.

#![allow(dead_code)]

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::extract::{Path as UrlPath, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use loadstorm::core::login::Credentials;
use loadstorm::{MetricsAggregator, SessionSettings, SiteContext, VirtualUser};

pub const HOME_PAGE: &str = r#"<!doctype html>
<html><head><title>Shop</title></head>
<body>
  <ul class="products">
    <li class="product type-product post-12">
      <a href="/product/beanie/">Beanie</a>
      <a href="?add-to-cart=12" data-product_id="12" data-product_sku="woo-beanie" class="button">Add to cart</a>
    </li>
    <li class="product type-product post-15">
      <a href="/product/hoodie/">Hoodie</a>
      <a href="/product/hoodie/" data-product_id="15" data-product_sku="" class="button">Select options</a>
    </li>
  </ul>
</body></html>"#;

pub const PLAIN_PAGE: &str = "<!doctype html><html><body><p>content</p></body></html>";

pub fn html(status: u16, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_raw(body.to_string(), "text/html; charset=UTF-8")
}

pub fn xml(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "application/xml")
}

/// Site root of the mock server, with trailing slash
pub fn site_url(server: &MockServer) -> Url {
    Url::parse(&format!("{}/", server.uri())).unwrap()
}

pub fn settings(server: &MockServer) -> SessionSettings {
    SessionSettings::new(site_url(server))
}

pub fn credentials(base: &str, n: u32, password: &str) -> Credentials {
    Credentials {
        username_base: base.to_string(),
        range_start: n,
        range_end: n,
        password: password.to_string(),
    }
}

pub fn site(server: &MockServer) -> Arc<SiteContext> {
    Arc::new(SiteContext::new(settings(server)))
}

/// Site whose sessions accept the asset server's self-signed certificate
pub fn insecure_site(server: &MockServer) -> Arc<SiteContext> {
    let mut settings = settings(server);
    settings.insecure_tls = true;
    Arc::new(SiteContext::new(settings))
}

pub fn site_with_credentials(server: &MockServer, credentials: Credentials) -> Arc<SiteContext> {
    let mut site = SiteContext::new(settings(server));
    site.credentials = Some(credentials);
    Arc::new(site)
}

pub fn vu(site: &Arc<SiteContext>, metrics: &Arc<MetricsAggregator>) -> VirtualUser {
    vu_with_assets(site, metrics, HashSet::new())
}

pub fn vu_with_assets(
    site: &Arc<SiteContext>,
    metrics: &Arc<MetricsAggregator>,
    known_assets: HashSet<String>,
) -> VirtualUser {
    VirtualUser::new(
        1,
        0,
        Arc::from("test"),
        Arc::clone(site),
        Arc::clone(metrics),
        known_assets,
    )
    .unwrap()
}

/// Home page with a product list plus the refreshed-fragments endpoint
pub async fn mount_shop_home(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(200, HOME_PAGE))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/"))
        .and(query_param("wc-ajax", "get_refreshed_fragments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "fragments": {},
            "cart_hash": ""
        })))
        .mount(server)
        .await;
}

/// Any GET under `route` answers with a plain 200 page
pub async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(200, body))
        .mount(server)
        .await;
}

// =============================================================================
// HTTPS asset server
// =============================================================================

const TEST_CERT: &[u8] = include_bytes!("../fixtures/tls/cert.pem");
const TEST_KEY: &[u8] = include_bytes!("../fixtures/tls/key.pem");

/// Serves `/assets/{name}` over TLS on a random local port and counts hits
pub struct AssetServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    handle: Handle,
}

impl AssetServer {
    pub async fn start() -> Self {
        // Process-wide provider must exist before any rustls config is built
        let _ = rustls::crypto::ring::default_provider().install_default();

        let tls = RustlsConfig::from_pem(TEST_CERT.to_vec(), TEST_KEY.to_vec())
            .await
            .unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/assets/{name}", get(serve_asset))
            .with_state(Arc::clone(&hits));

        let handle = Handle::new();
        let server = axum_server::bind_rustls("127.0.0.1:0".parse().unwrap(), tls)
            .handle(handle.clone());
        tokio::spawn(async move { server.serve(app.into_make_service()).await });
        let addr = handle.listening().await.unwrap();

        Self { addr, hits, handle }
    }

    /// Requests served so far
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Page referencing three assets here, one per accepted URL form
    pub fn page(&self) -> String {
        let host = self.addr;
        format!(
            r#"<html><head>
  <link rel="stylesheet" href="http://{host}/assets/style.css">
  <script src="//{host}/assets/app.js"></script>
</head><body>
  <img src="https://{host}/assets/logo.png">
  <img src="/relative.png">
</body></html>"#
        )
    }
}

impl Drop for AssetServer {
    fn drop(&mut self) {
        self.handle.shutdown();
    }
}

async fn serve_asset(
    State(hits): State<Arc<AtomicUsize>>,
    UrlPath(name): UrlPath<String>,
) -> impl IntoResponse {
    hits.fetch_add(1, Ordering::SeqCst);
    let content_type = if name.ends_with(".css") {
        "text/css"
    } else if name.ends_with(".js") {
        "application/javascript"
    } else {
        "image/png"
    };
    ([(header::CONTENT_TYPE, content_type)], format!("/* {name} */"))
}
