use std::time::Duration;

use async_trait::async_trait;

use super::{Behavior, BehaviorKind};
use crate::core::{RequestParams, VirtualUser};
use crate::errors::IterationResult;

/// Pause between static-page requests
const STATIC_PAUSE: Duration = Duration::from_secs(1);

/// Request the site root once, sample `status >= 400` into the error rate
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPage;

#[async_trait]
impl Behavior for StaticPage {
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Static
    }

    async fn run(&self, vu: &mut VirtualUser) -> IterationResult<()> {
        let url = vu.site().settings.site.to_string();
        let response = vu.fetch(&url, &RequestParams::default()).await?;
        vu.metrics()
            .record_soft(&response, response.status >= 400);

        tokio::time::sleep(STATIC_PAUSE).await;
        Ok(())
    }
}
