//! WooCommerce behavior graphs
//!
//! ```text
//! homepage: home page + assets -> refreshed fragments -> pause
//! browser:  homepage -> 5 x (random product page -> pause)
//! buyer:    homepage -> add to cart -> cart -> checkout
//! customer: homepage -> my-account login -> orders -> account details
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use super::{Behavior, BehaviorKind};
use crate::core::checks::CheckKind;
use crate::core::products::{get_products, pick};
use crate::core::{Exchange, LoginFlavor, LoginFlow, VirtualUser};
use crate::errors::IterationResult;

/// Product pages a browser visits per iteration
pub const PRODUCT_VISITS: usize = 5;

/// Shared entry action: home page, its assets, the fragments call, then pause
pub async fn homepage(vu: &mut VirtualUser) -> IterationResult<Exchange> {
    let home_url = vu.site().settings.site.to_string();
    let home = vu.get_page(&home_url).await?;
    vu.refreshed_fragments().await?;
    vu.pause().await;
    Ok(home)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Homepage;

#[async_trait]
impl Behavior for Homepage {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Homepage
    }

    async fn run(&self, vu: &mut VirtualUser) -> IterationResult<()> {
        homepage(vu).await.map(|_| ())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Browser;

#[async_trait]
impl Behavior for Browser {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Browser
    }

    async fn run(&self, vu: &mut VirtualUser) -> IterationResult<()> {
        let home = homepage(vu).await?;
        let products = get_products(&home.body, &vu.site().settings.site, false);

        for _ in 0..PRODUCT_VISITS {
            let link = pick(&products, "products")?.link.clone();
            vu.get_page(&link).await?;
            vu.pause().await;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Buyer;

#[async_trait]
impl Behavior for Buyer {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Buyer
    }

    async fn run(&self, vu: &mut VirtualUser) -> IterationResult<()> {
        let site = Arc::clone(vu.site());
        let home = homepage(vu).await?;

        let products = get_products(&home.body, &site.settings.site, true);
        let product = pick(&products, "add-to-cart products")?.clone();

        vu.add_to_cart(&product, 1).await?;
        vu.pause().await;

        let cart = vu.get_page(&site.settings.url("cart/")).await?;
        if let Err(err) = CheckKind::CartHasProduct.verify(&cart) {
            vu.metrics().record_cart_failure();
            return Err(err);
        }
        vu.pause().await;

        vu.get_page(&site.settings.url("checkout/")).await?;
        vu.pause().await;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Customer;

#[async_trait]
impl Behavior for Customer {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Customer
    }

    async fn run(&self, vu: &mut VirtualUser) -> IterationResult<()> {
        let site = Arc::clone(vu.site());
        homepage(vu).await?;

        LoginFlow::new(LoginFlavor::WooCommerce, site.credentials()?)
            .run(vu)
            .await?;
        vu.pause().await;

        vu.get_page(&site.settings.url("my-account/orders/")).await?;
        vu.pause().await;

        vu.get_page(&site.settings.url("my-account/edit-account/")).await?;
        vu.pause().await;
        Ok(())
    }
}
