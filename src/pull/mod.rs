//! Pull engine: decides which feeds are due, fetches them with bounded
//! concurrency, and records each outcome on the feed.
//!
//! - [`policy`] - the fetch/skip decision for one feed
//! - [`single_feed`] - fetch, store and record for one feed under a deadline
//! - [`batch`] - bounded fan-out over many feeds, collecting failures
//! - [`puller`] - the entry points used by the CLI and the periodic loop
//!
//! Remote problems (network, HTTP status, parse, per-feed timeout) are
//! recorded on the feed and never fail a pull. Storage problems do.

mod batch;
mod policy;
mod puller;
mod single_feed;

#[cfg(test)]
pub(crate) mod test_support;

use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::storage::StorageError;

pub use batch::{pull_feeds, FeedPullError};
pub use policy::{decide, should_fetch, Decision, SkipReason, DEFAULT_INTERVAL};
pub use puller::{Puller, PullerSettings, DEFAULT_MAX_WORKERS};
pub use single_feed::{SingleFeedPuller, DEFAULT_FEED_TIMEOUT};

/// Errors that abort a single feed's pull.
#[derive(Debug, Error)]
pub enum PullError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    /// Persisting a fetched feed overran the per-feed deadline
    #[error("Pull timed out after {0:?}")]
    Timeout(Duration),
    /// The sweep deadline cancelled this feed's pull
    #[error("Sweep deadline exceeded")]
    SweepTimeout,
}

/// What happened to one feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    /// The policy decided not to fetch
    Skipped(SkipReason),
    /// Fetched and stored; `inserted` counts new items only
    Fetched { inserted: u64 },
    /// Fetched, but the server or the build date said nothing changed
    Unchanged,
    /// The fetch failed and the message was recorded on the feed
    FetchFailed { message: String },
}

/// `now + timeout`, saturating at roughly thirty years out.
pub(crate) fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(86_400 * 365 * 30))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_after_saturates() {
        let now = Instant::now();
        assert_eq!(deadline_after(Duration::from_secs(30)), now + Duration::from_secs(30));
        assert!(deadline_after(Duration::MAX) > now + Duration::from_secs(86_400 * 365));
    }
}
