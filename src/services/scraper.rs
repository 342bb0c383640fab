//! The scraper service: wraps the scheduler for lifecycle management.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::scrape::pipeline::Pipeline;
use crate::scrape::scheduler::Scheduler;
use crate::services::manager::Service;
use crate::state::{AppState, ServiceStatus};

pub struct ScraperService {
    scheduler: Scheduler,
    state: AppState,
}

impl ScraperService {
    pub fn new(state: AppState, pipeline: Arc<Pipeline>, config: Arc<Config>) -> Self {
        let scheduler = Scheduler::new(state.db_pool.clone(), pipeline, config);
        Self { scheduler, state }
    }
}

#[async_trait]
impl Service for ScraperService {
    fn name(&self) -> &'static str {
        "scraper"
    }

    async fn run(self: Box<Self>, shutdown_rx: broadcast::Receiver<()>) {
        let statuses = self.state.service_statuses.clone();
        let is_leader = self.state.config.app_instance == 0;
        statuses.set(
            "scraper",
            if is_leader {
                ServiceStatus::Active
            } else {
                ServiceStatus::Disabled
            },
        );

        self.scheduler.run(shutdown_rx).await;

        statuses.set("scraper", ServiceStatus::Disabled);
    }
}
