use futures::future;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::future::Future;

use super::PullError;
use crate::storage::Feed;

/// A feed whose pull returned an error, paired with that error.
#[derive(Debug)]
pub struct FeedPullError {
    pub feed: Feed,
    pub error: PullError,
}

impl fmt::Display for FeedPullError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "feed {} ({}): {}", self.feed.id, self.feed.display_name(), self.error)
    }
}

impl std::error::Error for FeedPullError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Run `pull_feed` over every feed with at most `max_workers` in flight.
///
/// Every feed is attempted exactly once, whatever happens to the others.
/// The returned errors are in completion order, one per failed feed. A
/// `max_workers` of zero runs one at a time.
pub async fn pull_feeds<F, Fut, T>(
    feeds: Vec<Feed>,
    force: bool,
    max_workers: usize,
    pull_feed: F,
) -> Vec<FeedPullError>
where
    F: Fn(Feed, bool) -> Fut,
    Fut: Future<Output = Result<T, PullError>>,
{
    stream::iter(feeds)
        .map(|feed| {
            let pull = pull_feed(feed.clone(), force);
            async move { pull.await.err().map(|error| FeedPullError { feed, error }) }
        })
        .buffer_unordered(max_workers.max(1))
        .filter_map(future::ready)
        .collect()
        .await
}
