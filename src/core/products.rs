//! WooCommerce product listings and random selection

use std::sync::LazyLock;

use rand::seq::IndexedRandom;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;
use url::Url;

use super::assets::selector;
use super::http::Exchange;
use crate::errors::{IterationError, IterationResult};
use crate::utils::resolve;

static PRODUCT_ITEMS: LazyLock<Selector> = LazyLock::new(|| selector("li[class*=product]"));

/// A product as listed on a shop or home page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: String,
    pub sku: String,
    /// Absolute product page URL
    pub link: String,
}

/// Extract products from a listing page
///
/// Each `li[class*=product]` item contributes its first child's `href` as the
/// link and its second child's `data-product_id`/`data-product_sku`. With
/// `add_to_cart_only`, only items whose button reads "add to cart" are kept
/// (variable products and out-of-stock items are skipped). Items without a
/// usable link are skipped.
pub fn get_products(body: &str, base: &Url, add_to_cart_only: bool) -> Vec<Product> {
    let doc = Html::parse_document(body);

    doc.select(&PRODUCT_ITEMS)
        .filter_map(|item| {
            let mut children = item.children().filter_map(ElementRef::wrap);
            let link_el = children.next()?;
            let button = children.next();

            if add_to_cart_only {
                let label = button
                    .map(|b| b.text().collect::<String>())
                    .unwrap_or_default();
                if !label.trim().eq_ignore_ascii_case("add to cart") {
                    return None;
                }
            }

            let link = resolve(base, link_el.value().attr("href")?)?;
            let attr = |name: &str| {
                button
                    .and_then(|b| b.value().attr(name))
                    .unwrap_or_default()
                    .to_string()
            };

            Some(Product {
                id: attr("data-product_id"),
                sku: attr("data-product_sku"),
                link,
            })
        })
        .collect()
}

/// Uniform random pick, `None` for an empty slice
pub fn sample<T>(items: &[T]) -> Option<&T> {
    items.choose(&mut rand::rng())
}

/// Uniform random pick that fails the iteration on an empty slice
pub fn pick<'a, T>(items: &'a [T], what: &'static str) -> IterationResult<&'a T> {
    sample(items).ok_or_else(|| {
        warn!(candidates = what, "Nothing to choose from");
        IterationError::EmptyCandidates(what)
    })
}

/// Non-empty `cart_hash` from an add-to-cart JSON response
pub fn cart_hash(exchange: &Exchange) -> Option<String> {
    let json = exchange.json()?;
    match json.get("cart_hash")? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;
    use std::time::Duration;

    const SHOP: &str = r#"
        <ul class="products">
          <li class="product type-product post-12">
            <a href="https://shop.test/product/beanie/" class="woocommerce-LoopProduct-link">Beanie</a>
            <a href="?add-to-cart=12" data-product_id="12" data-product_sku="woo-beanie" class="button add_to_cart_button">Add to cart</a>
          </li>
          <li class="product type-product post-15">
            <a href="/product/hoodie/">Hoodie</a>
            <a href="/product/hoodie/" data-product_id="15" data-product_sku="" class="button">Select options</a>
          </li>
          <li class="product-category"><span>no link here</span></li>
        </ul>"#;

    fn base() -> Url {
        Url::parse("https://shop.test/").unwrap()
    }

    #[test]
    fn test_get_products_all() {
        let products = get_products(SHOP, &base(), false);
        assert_eq!(products.len(), 2);
        assert_eq!(
            products[0],
            Product {
                id: "12".to_string(),
                sku: "woo-beanie".to_string(),
                link: "https://shop.test/product/beanie/".to_string(),
            }
        );
        assert_eq!(products[1].link, "https://shop.test/product/hoodie/");
    }

    #[test]
    fn test_get_products_add_to_cart_only() {
        let products = get_products(SHOP, &base(), true);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id, "12");
    }

    #[test]
    fn test_sample_and_pick() {
        let empty: [u8; 0] = [];
        assert!(sample(&empty).is_none());
        assert!(matches!(
            pick(&empty, "products"),
            Err(IterationError::EmptyCandidates("products"))
        ));

        let items = [1, 2, 3];
        for _ in 0..50 {
            assert!(items.contains(pick(&items, "items").unwrap()));
        }
    }

    #[test]
    fn test_cart_hash() {
        let exchange = |body: &str| {
            Exchange::new("https://shop.test/", 200, HeaderMap::new(), body, Duration::ZERO)
        };
        assert_eq!(
            cart_hash(&exchange(r#"{"fragments":{},"cart_hash":"abc123"}"#)).as_deref(),
            Some("abc123")
        );
        assert_eq!(cart_hash(&exchange(r#"{"cart_hash":""}"#)), None);
        assert_eq!(cart_hash(&exchange(r#"{"error":true}"#)), None);
        assert_eq!(cart_hash(&exchange("<html>")), None);
    }
}
