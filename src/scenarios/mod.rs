//! Scenario behaviors
//!
//! A [`Behavior`] is what one VU does in one iteration. The scheduler calls
//! [`Behavior::run`] repeatedly with a fresh [`VirtualUser`] each time.
//!
//! # Available behaviors
//! - `static`: single GET of the site root, status >= 400 sampled as an error
//! - `wordpress`: homepage, wp-login, then every sitemap page
//! - `homepage`, `browser`, `buyer`, `customer`: WooCommerce graphs built on a
//!   shared homepage action

mod static_page;
mod woocommerce;
mod wordpress;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

pub use static_page::StaticPage;
pub use woocommerce::{Browser, Buyer, Customer, Homepage, PRODUCT_VISITS, homepage};
pub use wordpress::WordPressBrowse;

use crate::core::VirtualUser;
use crate::errors::{ConfigError, IterationResult};

#[async_trait]
pub trait Behavior: Send + Sync + fmt::Debug {
    fn kind(&self) -> BehaviorKind;

    /// Run one iteration; an error aborts it
    async fn run(&self, vu: &mut VirtualUser) -> IterationResult<()>;
}

/// Behavior selector used by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BehaviorKind {
    Static,
    WordPress,
    Homepage,
    Browser,
    Buyer,
    Customer,
}

impl BehaviorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::WordPress => "wordpress",
            Self::Homepage => "homepage",
            Self::Browser => "browser",
            Self::Buyer => "buyer",
            Self::Customer => "customer",
        }
    }

    /// Whether this behavior logs in and therefore needs credentials
    pub fn needs_login(self) -> bool {
        matches!(self, Self::WordPress | Self::Customer)
    }

    /// Whether this behavior browses the pages found by the sitemap crawl
    pub fn needs_sitemap(self) -> bool {
        matches!(self, Self::WordPress)
    }

    pub fn build(self) -> Arc<dyn Behavior> {
        match self {
            Self::Static => Arc::new(StaticPage),
            Self::WordPress => Arc::new(WordPressBrowse),
            Self::Homepage => Arc::new(Homepage),
            Self::Browser => Arc::new(Browser),
            Self::Buyer => Arc::new(Buyer),
            Self::Customer => Arc::new(Customer),
        }
    }
}

impl fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BehaviorKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "wordpress" | "loadstorm" => Ok(Self::WordPress),
            "homepage" => Ok(Self::Homepage),
            "browser" => Ok(Self::Browser),
            "buyer" => Ok(Self::Buyer),
            "customer" => Ok(Self::Customer),
            other => Err(ConfigError::InvalidValue {
                name: "behavior",
                reason: format!("unknown behavior '{other}'"),
            }),
        }
    }
}
