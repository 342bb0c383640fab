//! Pipeline run history.
//!
//! A run row is inserted optimistically with status `success` when the run
//! starts and receives exactly one terminal update: `complete` keeps the
//! status, `error` flips it to `failed`. The scheduler's minimum-interval
//! check derives from the most recent completed successful run.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Duration;

use crate::data::models::{RunKind, ScrapeRun};

/// Counters accumulated over one pipeline run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunStats {
    pub links_discovered: i32,
    pub links_processed: i32,
    pub records_added: i32,
    pub records_updated: i32,
    pub records_deleted: i32,
    pub summary_page_status: Option<i32>,
}

const RUN_SELECT: &str = "SELECT id, kind, status, summary_url, started_at, completed_at, \
            duration_ms, links_discovered, links_processed, records_added, records_updated, \
            records_deleted, summary_page_status, error_message, error_details \
     FROM scrape_runs";

/// Record the start of a run and return its id.
pub async fn start(pool: &PgPool, kind: RunKind, summary_url: &str) -> Result<i64> {
    let id = sqlx::query_scalar(
        "INSERT INTO scrape_runs (kind, summary_url) VALUES ($1, $2) RETURNING id",
    )
    .bind(kind)
    .bind(summary_url)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Terminal update for a run that finished without fatal step errors.
pub async fn complete(pool: &PgPool, run_id: i64, stats: &RunStats, duration_ms: i64) -> Result<()> {
    sqlx::query(
        "UPDATE scrape_runs SET completed_at = now(), duration_ms = $2, links_discovered = $3, \
             links_processed = $4, records_added = $5, records_updated = $6, records_deleted = $7, \
             summary_page_status = $8 \
         WHERE id = $1",
    )
    .bind(run_id)
    .bind(duration_ms)
    .bind(stats.links_discovered)
    .bind(stats.links_processed)
    .bind(stats.records_added)
    .bind(stats.records_updated)
    .bind(stats.records_deleted)
    .bind(stats.summary_page_status)
    .execute(pool)
    .await?;
    Ok(())
}

/// Terminal update for a run in which at least one step failed fatally.
///
/// Partial progress still counts: the stats reflect whatever the run managed
/// before or around the failure.
pub async fn error(
    pool: &PgPool,
    run_id: i64,
    stats: &RunStats,
    duration_ms: i64,
    message: &str,
    details: Option<serde_json::Value>,
) -> Result<()> {
    sqlx::query(
        "UPDATE scrape_runs SET status = 'failed', completed_at = now(), duration_ms = $2, \
             links_discovered = $3, links_processed = $4, records_added = $5, \
             records_updated = $6, records_deleted = $7, summary_page_status = $8, \
             error_message = $9, error_details = $10 \
         WHERE id = $1",
    )
    .bind(run_id)
    .bind(duration_ms)
    .bind(stats.links_discovered)
    .bind(stats.links_processed)
    .bind(stats.records_added)
    .bind(stats.records_updated)
    .bind(stats.records_deleted)
    .bind(stats.summary_page_status)
    .bind(message)
    .bind(details)
    .execute(pool)
    .await?;
    Ok(())
}

/// When the most recent successful run started, if any.
pub async fn last_successful_started_at(pool: &PgPool) -> Result<Option<DateTime<Utc>>> {
    let ts = sqlx::query_scalar(
        "SELECT started_at FROM scrape_runs \
         WHERE status = 'success' AND completed_at IS NOT NULL \
         ORDER BY started_at DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;
    Ok(ts)
}

/// Whether enough time has passed since the last successful run.
///
/// A store with no successful runs always scrapes.
pub async fn should_scrape(pool: &PgPool, min_interval: Duration) -> Result<bool> {
    match last_successful_started_at(pool).await? {
        None => Ok(true),
        Some(last) => {
            let elapsed = (Utc::now() - last).to_std().unwrap_or(Duration::ZERO);
            Ok(elapsed >= min_interval)
        }
    }
}

/// Most recent run row, for status surfaces.
pub async fn latest(pool: &PgPool) -> Result<Option<ScrapeRun>> {
    let row = sqlx::query_as(&format!("{RUN_SELECT} ORDER BY started_at DESC LIMIT 1"))
        .fetch_optional(pool)
        .await?;
    Ok(row)
}
