//! Feed fetch collaborator: turns a URL plus per-feed request options into
//! parsed entries or a [`FetchError`].
//!
//! - [`parser`] - document parsing using the `feed-rs` crate
//! - [`fetcher`] - HTTP retrieval with proxy and conditional-request support
//!
//! The pull engine depends only on the [`FeedFetcher`] trait, so tests can
//! substitute a scripted fetcher.

mod fetcher;
mod parser;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::storage::RequestOptions;

pub use fetcher::{FetchError, HttpFeedFetcher, DEFAULT_USER_AGENT};
pub use parser::{parse_feed, ParsedEntry, ParsedFeed};

/// Successful fetch result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedFeed {
    pub title: Option<String>,
    /// Feed-level build time reported by the document
    pub last_build: Option<DateTime<Utc>>,
    pub entries: Vec<ParsedEntry>,
    /// Validators to send on the next conditional request
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    /// Server answered `304 Not Modified`; `entries` is empty
    pub not_modified: bool,
}

/// Retrieves and parses one feed.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str, options: &RequestOptions) -> Result<FetchedFeed, FetchError>;
}
