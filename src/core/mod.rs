pub mod assets;
pub mod checks;
pub mod classifier;
pub mod http;
pub mod login;
pub mod metrics;
pub mod products;
pub mod session;
pub mod sitemap;
pub mod vu;

// Re-export commonly used types for convenience
pub use assets::{AssetIndex, check_https_protocol, discover_new, filter_domains, filter_versions};
pub use checks::CheckKind;
pub use classifier::{
    CACHE_SIGNALS, CacheSignal, ContentCategory, MetricRecord, classify, response_was_cached,
    wp_metrics,
};
pub use http::{Exchange, RequestParams, merge_headers};
pub use login::{Credentials, LoginFlavor, LoginFlow, LoginState, verify_login};
pub use metrics::{MetricsAggregator, MetricsSnapshot};
pub use products::{Product, get_products, sample};
pub use session::{AssetRetention, Pacing, SessionContext, SessionSettings};
pub use sitemap::{crawl, remove_author_category_links};
pub use vu::{SiteContext, VirtualUser};
