//! Notification dispatch log, read only for the sliding-window rate limit.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Number of digests sent to a user since the given instant.
pub async fn count_since(pool: &PgPool, user_id: i64, since: DateTime<Utc>) -> Result<i64> {
    let count = sqlx::query_scalar(
        "SELECT count(*) FROM search_notifications WHERE user_id = $1 AND sent_at >= $2",
    )
    .bind(user_id)
    .bind(since)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Append a log entry after a digest was dispatched.
pub async fn record(
    pool: &PgPool,
    user_id: i64,
    match_count: i64,
    searches_matched: i64,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO search_notifications (user_id, match_count, searches_matched) \
         VALUES ($1, $2, $3)",
    )
    .bind(user_id)
    .bind(match_count as i32)
    .bind(searches_matched as i32)
    .execute(pool)
    .await?;
    Ok(())
}
