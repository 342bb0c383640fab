//! One ingestion run end to end: summary fetch, link discovery, per-link
//! fetch/parse/sync, run bookkeeping, then saved-search matching.
//!
//! Steps are strictly sequential. A fatal step failure ends that step only;
//! the other date is still attempted and partial progress is recorded. The
//! run is marked failed if any step failed.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use serde_json::json;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use url::Url;

use crate::config::Config;
use crate::data::models::{RunKind, RunStatus};
use crate::data::scrape_runs::{self, RunStats};
use crate::fetch::{FetchError, Fetcher};
use crate::mailer::{DataErrorKind, DataErrorReport, Mailer, truncate_html_sample};
use crate::notify;
use crate::scrape::discovery::{self, DiscoveredLink};
use crate::scrape::sync::SyncCounts;
use crate::scrape::{parser, sync};
use crate::utils::fmt_duration;

/// A fatal failure of one pipeline step.
#[derive(Debug)]
pub struct StepFailure {
    pub target_date: Option<NaiveDate>,
    pub url: String,
    pub stage: &'static str,
    pub message: String,
}

/// Result of one pipeline run.
#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: i64,
    pub status: RunStatus,
    pub stats: RunStats,
    pub failures: Vec<StepFailure>,
}

pub struct Pipeline {
    pool: PgPool,
    fetcher: Fetcher,
    mailer: Arc<Mailer>,
    config: Arc<Config>,
}

impl Pipeline {
    pub fn new(pool: PgPool, fetcher: Fetcher, mailer: Arc<Mailer>, config: Arc<Config>) -> Self {
        Self {
            pool,
            fetcher,
            mailer,
            config,
        }
    }

    /// Execute one run. Returns `Err` only for bookkeeping failures (the run
    /// row could not be written); scrape failures land in the outcome.
    pub async fn run(
        &self,
        kind: RunKind,
        cancel: &CancellationToken,
    ) -> anyhow::Result<RunOutcome> {
        let summary_url =
            Url::parse(&self.config.summary_page_url).context("invalid summary page URL")?;

        let run_id = scrape_runs::start(&self.pool, kind, summary_url.as_str()).await?;
        let started = Instant::now();
        info!(run_id, ?kind, "pipeline run started");

        let mut stats = RunStats::default();
        let mut failures: Vec<StepFailure> = Vec::new();

        // Summary page and link discovery. A failure here fails the whole
        // run; there is nothing to process without links.
        let summary = match self.fetcher.fetch(&summary_url, cancel).await {
            Ok(page) => {
                stats.summary_page_status = Some(page.status.as_u16() as i32);
                Some(page)
            }
            Err(FetchError::Cancelled) => None,
            Err(e) => {
                self.mailer
                    .data_error(
                        DataErrorKind::LinkDiscovery,
                        DataErrorReport {
                            error: e.to_string(),
                            url: Some(summary_url.to_string()),
                            ..Default::default()
                        },
                    )
                    .await;
                failures.push(StepFailure {
                    target_date: None,
                    url: summary_url.to_string(),
                    stage: "summary-fetch",
                    message: e.to_string(),
                });
                None
            }
        };

        let mut synced_any = false;
        if let Some(summary) = summary {
            let allowed = self.config.allowed_hosts();
            let links = discovery::discover_cause_lists(
                &summary.body,
                &summary_url,
                self.config.division,
                Utc::now(),
                &allowed,
            );
            stats.links_discovered = links.len() as i32;
            if links.is_empty() {
                info!(run_id, "no cause list links published for today or tomorrow");
            }

            for link in &links {
                if cancel.is_cancelled() {
                    break;
                }
                match self.process_link(link, cancel).await {
                    Ok(counts) => {
                        stats.links_processed += 1;
                        stats.records_added += counts.added as i32;
                        stats.records_updated += counts.updated as i32;
                        stats.records_deleted += counts.deleted as i32;
                        synced_any = true;
                    }
                    Err(failure) => {
                        warn!(
                            run_id,
                            stage = failure.stage,
                            url = %failure.url,
                            error = %failure.message,
                            "pipeline step failed"
                        );
                        failures.push(failure);
                    }
                }
            }
        }

        let duration_ms = started.elapsed().as_millis() as i64;
        let cancelled = cancel.is_cancelled();
        let status = if failures.is_empty() && !cancelled {
            RunStatus::Success
        } else {
            RunStatus::Failed
        };

        match status {
            RunStatus::Success => {
                scrape_runs::complete(&self.pool, run_id, &stats, duration_ms).await?;
            }
            RunStatus::Failed => {
                let mut messages: Vec<String> = failures
                    .iter()
                    .map(|f| format!("{}: {} ({})", f.stage, f.message, f.url))
                    .collect();
                if cancelled {
                    messages.push("run cancelled during shutdown".to_string());
                }
                let details = json!(
                    failures
                        .iter()
                        .map(|f| {
                            json!({
                                "stage": f.stage,
                                "url": f.url,
                                "date": f.target_date,
                                "message": f.message,
                            })
                        })
                        .collect::<Vec<_>>()
                );
                scrape_runs::error(
                    &self.pool,
                    run_id,
                    &stats,
                    duration_ms,
                    &messages.join("; "),
                    Some(details),
                )
                .await?;
            }
        }

        info!(
            run_id,
            status = ?status,
            links_discovered = stats.links_discovered,
            links_processed = stats.links_processed,
            added = stats.records_added,
            updated = stats.records_updated,
            deleted = stats.records_deleted,
            duration = fmt_duration(started.elapsed()),
            "pipeline run finished"
        );

        // Matching runs after all syncs, even when nothing changed: listings
        // that became current since the last digest still count.
        if synced_any && !cancelled {
            if let Err(e) =
                notify::run_saved_search_matching(&self.pool, &self.mailer, &self.config, Utc::now())
                    .await
            {
                error!(run_id, error = ?e, "saved search matching failed");
            }
        }

        Ok(RunOutcome {
            run_id,
            status,
            stats,
            failures,
        })
    }

    /// Fetch, parse, and sync one discovered cause list.
    async fn process_link(
        &self,
        link: &DiscoveredLink,
        cancel: &CancellationToken,
    ) -> Result<SyncCounts, StepFailure> {
        let page = self
            .fetcher
            .fetch(&link.url, cancel)
            .await
            .map_err(|e| StepFailure {
                target_date: Some(link.target_date),
                url: link.url.to_string(),
                stage: "fetch",
                message: e.to_string(),
            })?;

        let rows = match parser::parse_cause_list(
            &page.body,
            link.target_date,
            link.url.as_str(),
            link.division,
            Utc::now(),
        ) {
            Ok(rows) => rows,
            Err(e) => {
                self.mailer
                    .data_error(
                        DataErrorKind::TableParsing,
                        DataErrorReport {
                            error: e.to_string(),
                            date: Some(link.target_date),
                            url: Some(link.url.to_string()),
                            html_sample: Some(truncate_html_sample(&page.body)),
                            context: Some(link.link_text.clone()),
                        },
                    )
                    .await;
                return Err(StepFailure {
                    target_date: Some(link.target_date),
                    url: link.url.to_string(),
                    stage: "parse",
                    message: e.to_string(),
                });
            }
        };

        sync::sync_hearings(&self.pool, link.target_date, rows)
            .await
            .map_err(|e| StepFailure {
                target_date: Some(link.target_date),
                url: link.url.to_string(),
                stage: "sync",
                message: format!("{e:#}"),
            })
    }
}
