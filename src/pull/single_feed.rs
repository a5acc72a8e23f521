use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout_at;

use super::{deadline_after, PullError, PullOutcome};
use crate::feed::{FeedFetcher, FetchError, FetchedFeed};
use crate::storage::{Feed, FeedStore, FeedUpdate, ItemStore, NewItem};

/// Deadline covering fetch and persistence of one feed.
pub const DEFAULT_FEED_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches one feed and records the outcome.
///
/// Exactly one feed update is written per pull: either the failure message,
/// or the success marker with the new build date and validators. Items are
/// inserted before that success write.
#[derive(Clone)]
pub struct SingleFeedPuller {
    fetcher: Arc<dyn FeedFetcher>,
    feeds: Arc<dyn FeedStore>,
    items: Arc<dyn ItemStore>,
    timeout: Duration,
}

impl SingleFeedPuller {
    pub fn new(
        fetcher: Arc<dyn FeedFetcher>,
        feeds: Arc<dyn FeedStore>,
        items: Arc<dyn ItemStore>,
    ) -> Self {
        Self {
            fetcher,
            feeds,
            items,
            timeout: DEFAULT_FEED_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Pull `feed` regardless of policy.
    ///
    /// # Errors
    ///
    /// Returns [`PullError::Storage`] when an item insert or the feed update
    /// fails, and [`PullError::Timeout`] when a write (success or failure)
    /// overruns the deadline. Fetch failures are recorded and reported as
    /// [`PullOutcome::FetchFailed`].
    pub async fn pull(&self, feed: &Feed) -> Result<PullOutcome, PullError> {
        let deadline = deadline_after(self.timeout);
        let fetched = match feed.link.as_deref().filter(|link| !link.is_empty()) {
            None => Err(FetchError::MissingLink),
            Some(link) => {
                match timeout_at(deadline, self.fetcher.fetch(link, &feed.request_options)).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::Timeout),
                }
            }
        };

        match fetched {
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(
                    feed_id = feed.id,
                    feed = %feed.display_name(),
                    error = %message,
                    "Feed fetch failed"
                );
                let update = FeedUpdate::failed(&message);
                match timeout_at(deadline, self.feeds.update(feed.id, &update)).await {
                    Ok(result) => result?,
                    Err(_) => return Err(PullError::Timeout(self.timeout)),
                }
                Ok(PullOutcome::FetchFailed { message })
            }
            Ok(fetched) => match timeout_at(deadline, self.record_success(feed, fetched)).await {
                Ok(result) => result,
                Err(_) => Err(PullError::Timeout(self.timeout)),
            },
        }
    }

    async fn record_success(
        &self,
        feed: &Feed,
        fetched: FetchedFeed,
    ) -> Result<PullOutcome, PullError> {
        let FetchedFeed {
            last_build,
            entries,
            etag,
            last_modified,
            not_modified,
            ..
        } = fetched;

        // A build date equal to the stored one means the document has not
        // changed since the last successful pull.
        let unchanged = not_modified || (last_build.is_some() && last_build == feed.last_build);

        let mut inserted = 0;
        if !unchanged && !entries.is_empty() {
            let items: Vec<NewItem> = entries
                .into_iter()
                .map(|entry| entry.into_item(feed.id))
                .collect();
            inserted = self.items.insert(&items).await?;
        }

        let last_build = if not_modified { feed.last_build } else { last_build };
        let update = FeedUpdate::succeeded(last_build).with_validators(etag, last_modified);
        self.feeds.update(feed.id, &update).await?;

        if unchanged {
            tracing::debug!(feed_id = feed.id, "Feed unchanged since last pull");
            Ok(PullOutcome::Unchanged)
        } else {
            tracing::info!(
                feed_id = feed.id,
                feed = %feed.display_name(),
                inserted,
                "Feed pulled"
            );
            Ok(PullOutcome::Fetched { inserted })
        }
    }
}
