//! Database connectivity and archive freshness check.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::data::scrape_runs;

/// A snapshot of store health for status surfaces.
#[derive(Debug, Clone)]
pub struct StoreHealth {
    pub hearing_count: i64,
    pub last_successful_run: Option<DateTime<Utc>>,
}

/// Verify the database is reachable and report archive freshness.
///
/// The count query doubles as the connectivity probe; an unreachable store
/// surfaces as an error, not a stale snapshot.
pub async fn check(pool: &PgPool) -> Result<StoreHealth> {
    let hearing_count = sqlx::query_scalar("SELECT count(*) FROM hearings")
        .fetch_one(pool)
        .await?;
    let last_successful_run = scrape_runs::last_successful_started_at(pool).await?;

    Ok(StoreHealth {
        hearing_count,
        last_successful_run,
    })
}
