//! Application wiring: configuration, database pool, and services.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use figment::{Figment, providers::Env};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::config::Config;
use crate::fetch::Fetcher;
use crate::mailer::Mailer;
use crate::scrape::pipeline::Pipeline;
use crate::services::manager::ServiceManager;
use crate::services::scraper::ScraperService;
use crate::services::signals::handle_shutdown_signals;
use crate::services::web::WebService;
use crate::state::AppState;

/// Load configuration from the environment.
pub fn load_config() -> anyhow::Result<Config> {
    Figment::new()
        .merge(Env::raw())
        .extract()
        .context("Failed to load config")
}

/// Create the shared database connection pool.
pub async fn connect_pool(config: &Config) -> anyhow::Result<PgPool> {
    let db_pool = PgPoolOptions::new()
        .min_connections(0)
        .max_connections(4)
        .acquire_timeout(Duration::from_secs(4))
        .idle_timeout(Duration::from_secs(60 * 2))
        .max_lifetime(Duration::from_secs(60 * 30))
        .connect(&config.database_url)
        .await
        .context("Failed to create database pool")?;

    info!(
        min_connections = 0,
        max_connections = 4,
        acquire_timeout = "4s",
        idle_timeout = "2m",
        max_lifetime = "30m",
        "database pool established"
    );
    Ok(db_pool)
}

/// Main application struct containing all necessary components
pub struct App {
    config: Arc<Config>,
    db_pool: PgPool,
    app_state: AppState,
    service_manager: ServiceManager,
}

impl App {
    /// Create a new App instance with all necessary components initialized
    pub async fn new() -> Result<Self, anyhow::Error> {
        let config = load_config()?;
        let db_pool = connect_pool(&config).await?;

        // Run database migrations
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .context("Failed to run database migrations")?;
        info!("Database migrations completed successfully");

        let config = Arc::new(config);
        let mailer = Arc::new(Mailer::from_config(&config));
        let app_state = AppState::new(db_pool.clone(), config.clone(), mailer);

        Ok(App {
            config,
            db_pool,
            app_state,
            service_manager: ServiceManager::new(),
        })
    }

    /// Register the web and scraper services.
    ///
    /// The scraper service is registered on every instance; the scheduler
    /// inside it no-ops on non-leaders so replicas only serve the read API.
    pub fn setup_services(&mut self) -> Result<(), anyhow::Error> {
        let web_service = Box::new(WebService::new(self.config.port, self.app_state.clone()));
        self.service_manager.register_service(web_service);

        let fetcher = Fetcher::new(&self.config.user_agent, self.config.request_timeout())
            .context("Failed to build HTTP fetcher")?;
        let pipeline = Arc::new(Pipeline::new(
            self.db_pool.clone(),
            fetcher,
            self.app_state.mailer.clone(),
            self.config.clone(),
        ));
        let scraper_service = Box::new(ScraperService::new(
            self.app_state.clone(),
            pipeline,
            self.config.clone(),
        ));
        self.service_manager.register_service(scraper_service);

        Ok(())
    }

    /// Start all registered services
    pub fn start_services(&mut self) {
        self.service_manager.spawn_all();
    }

    /// Run the application and handle shutdown signals
    pub async fn run(self) -> ExitCode {
        handle_shutdown_signals(self.service_manager, self.config.shutdown_timeout).await
    }
}
