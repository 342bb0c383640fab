//! Database models and per-table query modules.

pub mod health;
pub mod hearings;
pub mod models;
pub mod notifications;
pub mod saved_searches;
pub mod scrape_runs;
pub mod users;
