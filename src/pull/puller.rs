use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant, MissedTickBehavior};

use super::batch::{pull_feeds, FeedPullError};
use super::policy::{decide, DEFAULT_INTERVAL};
use super::single_feed::{SingleFeedPuller, DEFAULT_FEED_TIMEOUT};
use super::{deadline_after, PullError, PullOutcome};
use crate::feed::FeedFetcher;
use crate::storage::{Feed, FeedFilter, FeedStore, ItemStore, StorageError};

pub const DEFAULT_MAX_WORKERS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullerSettings {
    /// Minimum age before a feed is due, and the period of [`Puller::run`]
    pub interval: Duration,
    /// Deadline for one feed's fetch and persistence
    pub feed_timeout: Duration,
    /// Upper bound on concurrent pulls in a sweep
    pub max_workers: usize,
}

impl Default for PullerSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            feed_timeout: DEFAULT_FEED_TIMEOUT,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

/// Entry point to the pull engine.
///
/// Cheap to clone; all collaborators are shared.
#[derive(Clone)]
pub struct Puller {
    feeds: Arc<dyn FeedStore>,
    single: SingleFeedPuller,
    settings: PullerSettings,
}

impl Puller {
    pub fn new(
        fetcher: Arc<dyn FeedFetcher>,
        feeds: Arc<dyn FeedStore>,
        items: Arc<dyn ItemStore>,
        settings: PullerSettings,
    ) -> Self {
        let single =
            SingleFeedPuller::new(fetcher, feeds.clone(), items).with_timeout(settings.feed_timeout);
        Self {
            feeds,
            single,
            settings,
        }
    }

    pub fn settings(&self) -> &PullerSettings {
        &self.settings
    }

    /// Apply the policy to `feed`, then pull it if it is due.
    pub async fn pull_feed(&self, feed: &Feed, force: bool) -> Result<PullOutcome, PullError> {
        let decision = decide(feed, Utc::now(), self.settings.interval).with_force(force);
        if let Some(reason) = decision.skip_reason() {
            tracing::info!(
                feed_id = feed.id,
                feed = %feed.display_name(),
                reason = %reason,
                "Skipping feed"
            );
            return Ok(PullOutcome::Skipped(reason));
        }
        self.single.pull(feed).await
    }

    /// Pull one feed by ID, bypassing the failure and interval checks.
    /// Suspended feeds are still skipped.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] (wrapped) for an unknown ID.
    pub async fn pull_one(&self, id: i64) -> Result<PullOutcome, PullError> {
        let feed = self.feeds.get(id).await?;
        self.pull_feed(&feed, true).await
    }

    /// Sweep every feed once.
    ///
    /// Per-feed errors are logged and returned, never raised. The sweep,
    /// listing included, is bounded by half the pull interval; feeds still
    /// in flight at that point fail with [`PullError::SweepTimeout`].
    ///
    /// # Errors
    ///
    /// Only a failure to list feeds is returned as an error, including
    /// [`PullError::SweepTimeout`] when listing alone overruns the deadline.
    pub async fn pull_all(&self, force: bool) -> Result<Vec<FeedPullError>, PullError> {
        let deadline = deadline_after(self.settings.interval / 2);
        let listed = timeout_at(deadline, self.feeds.list(&FeedFilter::default()))
            .await
            .map_err(|_| PullError::SweepTimeout)?;
        let feeds = match listed {
            Ok(feeds) => feeds,
            Err(StorageError::NotFound(_)) => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let total = feeds.len();
        tracing::debug!(feeds = total, force, "Starting pull sweep");

        let errors = self.pull_until(feeds, force, deadline).await;

        for e in &errors {
            tracing::error!(
                feed_id = e.feed.id,
                feed = %e.feed.display_name(),
                error = %e.error,
                "Feed pull failed"
            );
        }
        tracing::info!(feeds = total, failed = errors.len(), "Pull sweep finished");
        Ok(errors)
    }

    /// Pull freshly added feeds, forced, under the same bounds as a sweep.
    ///
    /// # Errors
    ///
    /// Fails if any ID cannot be loaded.
    pub async fn pull_new(&self, ids: &[i64]) -> Result<Vec<FeedPullError>, PullError> {
        let mut feeds = Vec::with_capacity(ids.len());
        for &id in ids {
            feeds.push(self.feeds.get(id).await?);
        }

        let deadline = deadline_after(self.settings.interval / 2);
        let errors = self.pull_until(feeds, true, deadline).await;
        for e in &errors {
            tracing::error!(feed_id = e.feed.id, error = %e.error, "New feed pull failed");
        }
        Ok(errors)
    }

    async fn pull_until(&self, feeds: Vec<Feed>, force: bool, deadline: Instant) -> Vec<FeedPullError> {
        pull_feeds(feeds, force, self.settings.max_workers, |feed, force| async move {
            match timeout_at(deadline, self.pull_feed(&feed, force)).await {
                Ok(result) => result,
                Err(_) => Err(PullError::SweepTimeout),
            }
        })
        .await
    }

    /// Sweep immediately, then once per interval, forever.
    ///
    /// Sweeps never overlap: a late sweep delays the next tick instead of
    /// queueing a burst.
    pub async fn run(&self) {
        tracing::info!(
            interval_secs = self.settings.interval.as_secs(),
            max_workers = self.settings.max_workers,
            "Puller started"
        );

        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.pull_all(false).await {
                tracing::error!(error = %e, "Scheduled pull sweep failed");
            }
        }
    }

    /// Run [`Puller::run`] on a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }
}
