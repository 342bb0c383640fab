//! Application configuration, loaded from the environment via figment.
//!
//! Every option has a default except `DATABASE_URL`. Retry count and backoff
//! are deliberately not configurable (see `fetch`), and the listing timezone
//! is fixed to Europe/London (see `scrape`).

use std::time::Duration;

use serde::Deserialize;

use crate::data::models::Division;

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_shutdown_timeout() -> u64 {
    60
}

fn default_summary_page_url() -> String {
    "https://www.judiciary.uk/courts-and-tribunals/court-of-appeal-criminal-division/daily-cause-list/"
        .to_string()
}

fn default_user_agent() -> String {
    format!("causelist-archiver/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_division() -> Division {
    Division::Criminal
}

fn default_scrape_interval_minutes() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_window_start_hour() -> u8 {
    6
}

fn default_window_end_hour() -> u8 {
    22
}

fn default_allowed_link_hosts() -> String {
    "www.judiciary.uk,judiciary.uk".to_string()
}

fn default_saved_search_min_length() -> usize {
    3
}

fn default_saved_search_max_length() -> usize {
    100
}

fn default_saved_search_max_per_user() -> i64 {
    10
}

fn default_notification_max_per_window() -> i64 {
    5
}

fn default_notification_window_hours() -> i64 {
    24
}

fn default_records_per_page() -> i64 {
    25
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Seconds to wait for services to drain on shutdown.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,

    #[serde(default = "default_summary_page_url")]
    pub summary_page_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Which division's cause lists to archive (`criminal` or `civil`).
    #[serde(default = "default_division")]
    pub division: Division,

    /// Minimum gap between successful pipeline runs.
    #[serde(default = "default_scrape_interval_minutes")]
    pub scrape_interval_minutes: u64,

    /// Run the pipeline once immediately after startup (leader only).
    #[serde(default = "default_true")]
    pub scrape_on_startup: bool,

    /// When enabled, runs only start when the London hour is within
    /// `[scrape_window_start_hour, scrape_window_end_hour)`.
    #[serde(default)]
    pub scrape_window_enabled: bool,

    #[serde(default = "default_window_start_hour")]
    pub scrape_window_start_hour: u8,

    #[serde(default = "default_window_end_hour")]
    pub scrape_window_end_hour: u8,

    /// Instance index; only instance 0 runs the scheduler. This is
    /// configuration-driven leader election and assumes one host per cluster.
    #[serde(default)]
    pub app_instance: u32,

    /// Comma-separated hostnames that discovered links are expected to be on.
    #[serde(default = "default_allowed_link_hosts")]
    pub allowed_link_hosts: String,

    #[serde(default = "default_saved_search_min_length")]
    pub saved_search_min_length: usize,

    #[serde(default = "default_saved_search_max_length")]
    pub saved_search_max_length: usize,

    #[serde(default = "default_saved_search_max_per_user")]
    pub saved_search_max_per_user: i64,

    /// Sliding-window notification rate limit: at most this many digests
    /// per user within `notification_window_hours`.
    #[serde(default = "default_notification_max_per_window")]
    pub notification_max_per_window: i64,

    #[serde(default = "default_notification_window_hours")]
    pub notification_window_hours: i64,

    #[serde(default = "default_records_per_page")]
    pub records_per_page_default: i64,

    /// Base URL used for links inside notification emails.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// SMTP relay host. Email dispatch is disabled when unset.
    #[serde(default)]
    pub smtp_host: Option<String>,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub smtp_username: Option<String>,

    #[serde(default)]
    pub smtp_password: Option<String>,

    /// From address for all outbound mail, e.g. `Cause Lists <noreply@example.org>`.
    #[serde(default)]
    pub smtp_from: Option<String>,

    /// Recipient for scraper data-error reports.
    #[serde(default)]
    pub data_error_recipient: Option<String>,
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn scrape_interval(&self) -> Duration {
        Duration::from_secs(self.scrape_interval_minutes * 60)
    }

    pub fn allowed_hosts(&self) -> Vec<&str> {
        self.allowed_link_hosts
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .collect()
    }
}
