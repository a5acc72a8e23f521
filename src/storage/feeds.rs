use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{Feed, FeedDbRow, FeedFilter, FeedUpdate, StorageError};

const FEED_COLUMNS: &str = "id, name, link, last_build, failure, suspended, updated_at, \
                            req_proxy, etag, last_modified";

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Insert a feed, or update name/proxy if the link is already known.
    ///
    /// Returns the feed ID (existing ID on conflict).
    pub async fn insert_feed(
        &self,
        link: &str,
        name: Option<&str>,
        proxy: Option<&str>,
    ) -> Result<i64, StorageError> {
        let now = chrono::Utc::now().timestamp();
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO feeds (name, link, req_proxy, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(link) DO UPDATE SET
                name = COALESCE(excluded.name, feeds.name),
                req_proxy = excluded.req_proxy
            RETURNING id
        "#,
        )
        .bind(name)
        .bind(link)
        .bind(proxy)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)?;
        Ok(id)
    }

    /// Get a single feed by ID.
    pub async fn get_feed(&self, feed_id: i64) -> Result<Feed, StorageError> {
        let row = sqlx::query_as::<_, FeedDbRow>(&format!(
            "SELECT {} FROM feeds WHERE id = ?",
            FEED_COLUMNS
        ))
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::from_sqlx)?;

        row.map(FeedDbRow::into_feed)
            .ok_or(StorageError::NotFound(feed_id))
    }

    /// List feeds matching the filter, ordered by ID.
    pub async fn list_feeds(&self, filter: &FeedFilter) -> Result<Vec<Feed>, StorageError> {
        let mut builder: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM feeds", FEED_COLUMNS));
        if let Some(suspended) = filter.suspended {
            builder.push(" WHERE suspended = ");
            builder.push_bind(suspended);
        }
        builder.push(" ORDER BY id");

        let rows: Vec<FeedDbRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from_sqlx)?;
        Ok(rows.into_iter().map(FeedDbRow::into_feed).collect())
    }

    /// Apply a partial update to a feed.
    ///
    /// Only `Some` fields are written, and `updated_at` is stamped in the
    /// same statement so an outcome and its timestamp land together.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no row has this ID.
    pub async fn update_feed(&self, feed_id: i64, update: &FeedUpdate) -> Result<(), StorageError> {
        let now = chrono::Utc::now().timestamp();

        let mut builder: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("UPDATE feeds SET updated_at = ");
        builder.push_bind(now);

        if let Some(last_build) = update.last_build {
            builder.push(", last_build = ");
            builder.push_bind(last_build.timestamp());
        }
        if let Some(failure) = &update.failure {
            builder.push(", failure = ");
            builder.push_bind(failure.as_column().map(str::to_owned));
        }
        if let Some(validators) = &update.validators {
            builder.push(", etag = ");
            builder.push_bind(validators.etag.clone());
            builder.push(", last_modified = ");
            builder.push_bind(validators.last_modified.clone());
        }
        if let Some(suspended) = update.suspended {
            builder.push(", suspended = ");
            builder.push_bind(suspended);
        }

        builder.push(" WHERE id = ");
        builder.push_bind(feed_id);

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(StorageError::from_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(feed_id));
        }
        Ok(())
    }

    /// Pause or resume scheduled pulls for a feed.
    pub async fn set_suspended(&self, feed_id: i64, suspended: bool) -> Result<(), StorageError> {
        self.update_feed(feed_id, &FeedUpdate::new().with_suspended(suspended))
            .await
    }

    /// Overwrite the last-touched time the interval check reads.
    pub async fn set_updated_at(
        &self,
        feed_id: i64,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), StorageError> {
        let result = sqlx::query("UPDATE feeds SET updated_at = ? WHERE id = ?")
            .bind(at.timestamp())
            .bind(feed_id)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(feed_id));
        }
        Ok(())
    }
}
