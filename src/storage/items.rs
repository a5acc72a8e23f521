use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{Item, NewItem, StorageError};

/// Maximum number of items to return from a single listing query
const MAX_ITEMS: i64 = 2000;

impl Database {
    // ========================================================================
    // Item Operations
    // ========================================================================

    /// Insert items in one transaction, returning how many rows were new.
    ///
    /// Items whose `(feed_id, guid)` already exists are ignored; stored items
    /// are never rewritten. Batch size of 50 keeps us well under SQLite's
    /// 999 parameter limit (7 columns * 50 = 350).
    pub async fn insert_items(&self, items: &[NewItem]) -> Result<u64, StorageError> {
        if items.is_empty() {
            return Ok(0);
        }

        const BATCH_SIZE: usize = 50;
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(StorageError::from_sqlx)?;
        let mut inserted: u64 = 0;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
                "INSERT OR IGNORE INTO items (feed_id, guid, title, link, content, pub_date, fetched_at) ",
            );

            builder.push_values(chunk, |mut b, item| {
                b.push_bind(item.feed_id)
                    .push_bind(&item.guid)
                    .push_bind(&item.title)
                    .push_bind(&item.link)
                    .push_bind(&item.content)
                    .push_bind(item.pub_date.map(|d| d.timestamp()))
                    .push_bind(now);
            });

            inserted += builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from_sqlx)?
                .rows_affected();
        }

        tx.commit().await.map_err(StorageError::from_sqlx)?;
        Ok(inserted)
    }

    /// Get items for a feed, newest first.
    pub async fn get_items_for_feed(
        &self,
        feed_id: i64,
        limit: Option<i64>,
    ) -> Result<Vec<Item>, StorageError> {
        let limit = limit.unwrap_or(500).min(MAX_ITEMS);

        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, feed_id, guid, title, link, content, pub_date, unread, fetched_at
            FROM items
            WHERE feed_id = ?
            ORDER BY pub_date DESC, fetched_at DESC
            LIMIT ?
        "#,
        )
        .bind(feed_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(items)
    }

    /// Count stored items for a feed.
    pub async fn count_items(&self, feed_id: i64) -> Result<i64, StorageError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM items WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from_sqlx)?;
        Ok(count)
    }
}
