use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{Behavior, BehaviorKind};
use crate::core::{LoginFlavor, LoginFlow, VirtualUser};
use crate::errors::IterationResult;

/// Homepage, WordPress login, then every page from the sitemap
#[derive(Debug, Clone, Copy, Default)]
pub struct WordPressBrowse;

#[async_trait]
impl Behavior for WordPressBrowse {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::WordPress
    }

    async fn run(&self, vu: &mut VirtualUser) -> IterationResult<()> {
        let site = Arc::clone(vu.site());

        vu.get_page(site.settings.site.as_str()).await?;
        vu.pause().await;

        let flavor = LoginFlavor::WordPress {
            login_path: site.wp_login.clone(),
        };
        LoginFlow::new(flavor, site.credentials()?).run(vu).await?;
        vu.pause().await;

        for (n, url) in site.pages.iter().enumerate() {
            debug!(vu = vu.id(), page = n + 1, url = %url, "Browsing page");
            vu.get_page(url).await?;
            vu.pause().await;
        }

        Ok(())
    }
}
