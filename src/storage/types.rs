use chrono::{DateTime, Utc};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Storage-layer errors.
///
/// These are local, persistence-side failures. The pull engine surfaces them
/// as real errors, unlike remote fetch failures which are recorded on the feed.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No feed row exists with the requested ID
    #[error("Feed {0} not found")]
    NotFound(i64),

    /// Another process holds a write lock on the database file
    #[error("Database is locked by another process")]
    Locked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StorageError {
    /// Classify a sqlx error, mapping SQLite lock conditions to [`StorageError::Locked`].
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
        {
            return StorageError::Locked;
        }

        StorageError::Database(err)
    }
}

// ============================================================================
// Failure State
// ============================================================================

/// Outcome of the most recent pull attempt, as recorded on the feed.
///
/// Persisted in a nullable TEXT column: `NULL` is [`FailureState::NotRecorded`],
/// the empty string is [`FailureState::Succeeded`], anything else is
/// [`FailureState::Failed`] carrying the message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FailureState {
    /// No attempt outcome has been written yet
    #[default]
    NotRecorded,
    /// The last attempt succeeded
    Succeeded,
    /// The last attempt failed with this message
    Failed(String),
}

impl FailureState {
    /// Decode the column value.
    pub fn from_column(value: Option<String>) -> Self {
        match value {
            None => FailureState::NotRecorded,
            Some(msg) if msg.is_empty() => FailureState::Succeeded,
            Some(msg) => FailureState::Failed(msg),
        }
    }

    /// Encode for the column.
    pub fn as_column(&self) -> Option<&str> {
        match self {
            FailureState::NotRecorded => None,
            FailureState::Succeeded => Some(""),
            FailureState::Failed(msg) => Some(msg),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FailureState::Failed(_))
    }

    /// The failure message, if the last attempt failed.
    pub fn message(&self) -> Option<&str> {
        match self {
            FailureState::Failed(msg) => Some(msg),
            _ => None,
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// Per-feed fetch configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Outbound HTTP(S) proxy URL (e.g. `http://proxy:3128`)
    pub proxy: Option<String>,
    /// `ETag` from the last successful response, sent as `If-None-Match`
    pub etag: Option<String>,
    /// `Last-Modified` from the last successful response, sent as `If-Modified-Since`
    pub last_modified: Option<String>,
}

/// Feed record as seen by the pull engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Feed {
    pub id: i64,
    pub name: Option<String>,
    pub link: Option<String>,
    /// Feed-level build time observed on the last successful fetch
    pub last_build: Option<DateTime<Utc>>,
    pub failure: FailureState,
    /// User-controlled pause flag
    pub suspended: bool,
    /// Last time this record was touched; the decision policy reads it as
    /// the time of the last attempt
    pub updated_at: DateTime<Utc>,
    pub request_options: RequestOptions,
}

impl Feed {
    /// Name for log output, falling back to the link.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.link.as_deref())
            .unwrap_or("<unnamed>")
    }
}

/// Internal row type for feed queries (used by sqlx FromRow).
/// Converts to [`Feed`] via `into_feed()`.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedDbRow {
    pub id: i64,
    pub name: Option<String>,
    pub link: Option<String>,
    pub last_build: Option<i64>,
    pub failure: Option<String>,
    pub suspended: bool,
    pub updated_at: i64,
    pub req_proxy: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl FeedDbRow {
    pub(crate) fn into_feed(self) -> Feed {
        Feed {
            id: self.id,
            name: self.name,
            link: self.link,
            last_build: self.last_build.and_then(from_timestamp),
            failure: FailureState::from_column(self.failure),
            suspended: self.suspended,
            updated_at: from_timestamp(self.updated_at).unwrap_or_default(),
            request_options: RequestOptions {
                proxy: self.req_proxy,
                etag: self.etag,
                last_modified: self.last_modified,
            },
        }
    }
}

pub(crate) fn from_timestamp(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

/// Conditional-request validators from one response. Written as a pair, so
/// a validator the server stopped sending is cleared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// Partial feed write. Only `Some` fields are applied; `updated_at` is
/// always stamped in the same statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedUpdate {
    pub last_build: Option<DateTime<Utc>>,
    pub failure: Option<FailureState>,
    pub validators: Option<Validators>,
    pub suspended: Option<bool>,
}

impl FeedUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcome write for a failed fetch.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            failure: Some(FailureState::Failed(message.into())),
            ..Self::default()
        }
    }

    /// Outcome write for a successful fetch: clears the failure.
    pub fn succeeded(last_build: Option<DateTime<Utc>>) -> Self {
        Self {
            last_build,
            failure: Some(FailureState::Succeeded),
            ..Self::default()
        }
    }

    /// Replace the stored validators with the ones the server returned.
    pub fn with_validators(mut self, etag: Option<String>, last_modified: Option<String>) -> Self {
        self.validators = Some(Validators {
            etag,
            last_modified,
        });
        self
    }

    pub fn with_suspended(mut self, suspended: bool) -> Self {
        self.suspended = Some(suspended);
        self
    }
}

/// Filter for feed listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedFilter {
    /// Restrict to suspended (`Some(true)`) or active (`Some(false)`) feeds
    pub suspended: Option<bool>,
}

/// Item ready for insertion, tagged with its owning feed.
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub feed_id: i64,
    /// De-duplication key, unique per feed
    pub guid: String,
    pub title: String,
    pub link: Option<String>,
    pub content: Option<String>,
    pub pub_date: Option<DateTime<Utc>>,
}

/// Stored item row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Item {
    pub id: i64,
    pub feed_id: i64,
    pub guid: String,
    pub title: String,
    pub link: Option<String>,
    pub content: Option<String>,
    pub pub_date: Option<i64>,
    pub unread: bool,
    pub fetched_at: i64,
}
