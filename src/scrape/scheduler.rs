//! Single-leader periodic driver for the ingestion pipeline.
//!
//! The scheduler wakes every minute. A tick starts a run only when no run is
//! in progress, the London hour is inside the optional scrape window, and the
//! minimum interval since the last successful run has passed. Only instance 0
//! ever runs; other instances are passive replicas serving the read API.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use sqlx::PgPool;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::Config;
use crate::data::models::{RunKind, RunStatus};
use crate::data::scrape_runs;
use crate::scrape::LONDON;
use crate::scrape::pipeline::Pipeline;

/// Wake-up cadence of the scheduler loop.
const TICK_INTERVAL: Duration = Duration::from_secs(60);

/// How long shutdown waits for an in-progress run before abandoning it.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(60);

/// Whether `now` falls inside the configured time-of-day window.
///
/// The window is `[start, end)` in London hours and may wrap midnight.
fn within_window(config: &Config, now: DateTime<Utc>) -> bool {
    if !config.scrape_window_enabled {
        return true;
    }
    let hour = now.with_timezone(&LONDON).hour() as u8;
    let (start, end) = (config.scrape_window_start_hour, config.scrape_window_end_hour);
    if start <= end {
        start <= hour && hour < end
    } else {
        hour >= start || hour < end
    }
}

pub struct Scheduler {
    pool: PgPool,
    pipeline: Arc<Pipeline>,
    config: Arc<Config>,
}

impl Scheduler {
    pub fn new(pool: PgPool, pipeline: Arc<Pipeline>, config: Arc<Config>) -> Self {
        Self {
            pool,
            pipeline,
            config,
        }
    }

    /// Runs the scheduler's main loop with graceful shutdown support.
    ///
    /// On shutdown the ticker stops, the in-progress run (if any) is
    /// cancelled, and the loop waits up to [`DRAIN_TIMEOUT`] before
    /// abandoning it.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        if self.config.app_instance != 0 {
            info!(
                instance = self.config.app_instance,
                "not the leader; scheduler disabled on this instance"
            );
            return;
        }

        info!("Scheduler service started");

        let mut next_tick = time::Instant::now() + TICK_INTERVAL;
        let mut current_run: Option<(JoinHandle<()>, CancellationToken)> = None;

        // The startup run happens before the first tick is ever observable.
        if self.config.scrape_on_startup {
            info!("performing startup run");
            current_run = Some(self.spawn_run(RunKind::Startup));
        }

        loop {
            tokio::select! {
                _ = time::sleep_until(next_tick) => {
                    next_tick = time::Instant::now() + TICK_INTERVAL;

                    // Non-reentrancy: ticks during a run are dropped.
                    if let Some((handle, _)) = &current_run
                        && !handle.is_finished()
                    {
                        debug!("run still in progress, skipping tick");
                        continue;
                    }

                    if !within_window(&self.config, Utc::now()) {
                        trace!("outside scrape window");
                        continue;
                    }

                    match scrape_runs::should_scrape(&self.pool, self.config.scrape_interval()).await {
                        Ok(true) => current_run = Some(self.spawn_run(RunKind::Scheduled)),
                        Ok(false) => trace!("minimum interval since last successful run not reached"),
                        Err(e) => warn!(error = ?e, "failed to check scrape history"),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Scheduler received shutdown signal");

                    if let Some((handle, cancel)) = current_run.take()
                        && !handle.is_finished()
                    {
                        cancel.cancel();
                        if time::timeout(DRAIN_TIMEOUT, handle).await.is_err() {
                            warn!(
                                timeout_secs = DRAIN_TIMEOUT.as_secs(),
                                "in-progress run did not finish in time, abandoning"
                            );
                        } else {
                            debug!("in-progress run drained");
                        }
                    }

                    info!("Scheduler exiting gracefully");
                    break;
                }
            }
        }
    }

    fn spawn_run(&self, kind: RunKind) -> (JoinHandle<()>, CancellationToken) {
        let cancel = CancellationToken::new();
        let pipeline = self.pipeline.clone();
        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                match pipeline.run(kind, &cancel).await {
                    Ok(outcome) if outcome.status == RunStatus::Failed => warn!(
                        run_id = outcome.run_id,
                        failures = outcome.failures.len(),
                        "pipeline run finished with failures"
                    ),
                    Ok(_) => {}
                    Err(e) => error!(error = ?e, "pipeline run aborted"),
                }
            }
        });
        (handle, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use figment::Figment;
    use figment::providers::Serialized;

    fn config(enabled: bool, start: u8, end: u8) -> Config {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(serde_json::json!({
                "database_url": "postgres://unused",
                "scrape_window_enabled": enabled,
                "scrape_window_start_hour": start,
                "scrape_window_end_hour": end,
            })))
            .extract()
            .unwrap();
        config
    }

    // 08:00 UTC on 15 January is 08:00 in London (GMT).
    fn winter_morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 8, 0, 0).unwrap()
    }

    // 23:30 UTC on 2 September is 00:30 on 3 September in London (BST).
    fn summer_midnight() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 2, 23, 30, 0).unwrap()
    }

    #[test]
    fn disabled_window_always_allows() {
        assert!(within_window(&config(false, 9, 17), winter_morning()));
    }

    #[test]
    fn window_bounds_are_half_open() {
        assert!(within_window(&config(true, 8, 17), winter_morning()));
        assert!(!within_window(&config(true, 9, 17), winter_morning()));
        // end hour is exclusive
        assert!(!within_window(&config(true, 6, 8), winter_morning()));
    }

    #[test]
    fn window_uses_london_hours_not_utc() {
        // 23:30 UTC is already past midnight in London during BST.
        assert!(within_window(&config(true, 0, 6), summer_midnight()));
        assert!(!within_window(&config(true, 6, 23), summer_midnight()));
    }

    #[test]
    fn wrapping_window_spans_midnight() {
        let cfg = config(true, 22, 6);
        assert!(within_window(&cfg, summer_midnight())); // 00:30 London
        assert!(!within_window(&cfg, winter_morning())); // 08:00 London
    }
}
