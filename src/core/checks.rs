//! Response checks
//!
//! Each [`CheckKind`] pairs a human-readable label with a predicate over a
//! completed [`Exchange`]. Checks never touch metrics on their own; callers
//! decide which counter a failed check feeds.

use std::sync::LazyLock;

use scraper::{Html, Selector};

use super::assets::selector;
use super::http::Exchange;
use crate::errors::{IterationError, IterationResult};

static CART_FORM: LazyLock<Selector> = LazyLock::new(|| selector(".woocommerce-cart-form"));
static WOO_LOGIN_BUTTON: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"button[name="login"]"#));
static WOO_PASSWORD_INPUT: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"input[name="password"]"#));
static WP_LOG_INPUT: LazyLock<Selector> = LazyLock::new(|| selector(r#"input[name="log"]"#));
static WP_PWD_INPUT: LazyLock<Selector> = LazyLock::new(|| selector(r#"input[name="pwd"]"#));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    /// Exactly one cart form on the page
    CartHasProduct,
    /// No WooCommerce login button or password field
    WooPageIsNotLogin,
    /// No WordPress `log`/`pwd` fields
    WpPageIsNotLogin,
}

impl CheckKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::CartHasProduct => "cart has product",
            Self::WooPageIsNotLogin | Self::WpPageIsNotLogin => "page is not login",
        }
    }

    pub fn passes(self, exchange: &Exchange) -> bool {
        match self {
            Self::CartHasProduct => {
                let doc = Html::parse_document(&exchange.body);
                doc.select(&CART_FORM).count() == 1
            }
            Self::WooPageIsNotLogin => {
                let doc = Html::parse_document(&exchange.body);
                doc.select(&WOO_LOGIN_BUTTON).next().is_none()
                    && doc.select(&WOO_PASSWORD_INPUT).next().is_none()
            }
            Self::WpPageIsNotLogin => {
                let doc = Html::parse_document(&exchange.body);
                doc.select(&WP_LOG_INPUT).next().is_none()
                    && doc.select(&WP_PWD_INPUT).next().is_none()
            }
        }
    }

    /// `Ok` when the check passes, otherwise [`IterationError::CheckFailed`]
    pub fn verify(self, exchange: &Exchange) -> IterationResult<()> {
        if self.passes(exchange) {
            Ok(())
        } else {
            Err(IterationError::CheckFailed {
                check: self.label(),
                url: exchange.url.clone(),
            })
        }
    }
}
