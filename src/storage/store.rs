//! Storage contracts consumed by the pull engine.
//!
//! The engine only needs a narrow read/write surface: list and load feeds,
//! write one partial update per pull outcome, and bulk-insert items.
//! [`Database`] implements both traits; tests provide in-memory doubles.

use async_trait::async_trait;

use super::schema::Database;
use super::types::{Feed, FeedFilter, FeedUpdate, NewItem, StorageError};

/// Feed persistence.
#[async_trait]
pub trait FeedStore: Send + Sync {
    async fn list(&self, filter: &FeedFilter) -> Result<Vec<Feed>, StorageError>;

    /// Load one feed; unknown IDs yield [`StorageError::NotFound`].
    async fn get(&self, id: i64) -> Result<Feed, StorageError>;

    /// Apply a partial update. Only `Some` fields are written.
    async fn update(&self, id: i64, update: &FeedUpdate) -> Result<(), StorageError>;
}

/// Item persistence.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Bulk insert. Returns the number of new rows; duplicate
    /// `(feed_id, guid)` pairs are left to the store's policy.
    async fn insert(&self, items: &[NewItem]) -> Result<u64, StorageError>;
}

#[async_trait]
impl FeedStore for Database {
    async fn list(&self, filter: &FeedFilter) -> Result<Vec<Feed>, StorageError> {
        self.list_feeds(filter).await
    }

    async fn get(&self, id: i64) -> Result<Feed, StorageError> {
        self.get_feed(id).await
    }

    async fn update(&self, id: i64, update: &FeedUpdate) -> Result<(), StorageError> {
        self.update_feed(id, update).await
    }
}

#[async_trait]
impl ItemStore for Database {
    async fn insert(&self, items: &[NewItem]) -> Result<u64, StorageError> {
        self.insert_items(items).await
    }
}
