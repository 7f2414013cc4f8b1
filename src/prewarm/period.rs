//! Current gameweek resolution

use std::sync::Arc;

use async_trait::async_trait;

use crate::client::LeagueSource;
use crate::error::FetchResult;

/// Decides which gameweek is "current" for a viewer.
///
/// Prewarm fetches everything gameweek-scoped for whatever this returns.
#[async_trait]
pub trait PeriodResolver: Send + Sync {
    async fn resolve(&self, viewer_id: &str) -> FetchResult<u32>;
}

/// The gameweek the backend publishes as current, the same for every viewer.
pub struct PublishedGameweek {
    source: Arc<dyn LeagueSource>,
}

impl PublishedGameweek {
    pub fn new(source: Arc<dyn LeagueSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl PeriodResolver for PublishedGameweek {
    async fn resolve(&self, _viewer_id: &str) -> FetchResult<u32> {
        self.source.current_gameweek().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockLeagueSource;

    #[tokio::test]
    async fn test_published_gameweek_reads_source() {
        let source = Arc::new(MockLeagueSource::new().with_gameweek(9));
        let resolver = PublishedGameweek::new(source);
        assert_eq!(resolver.resolve("anyone").await, Ok(9));
    }
}
