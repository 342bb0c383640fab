pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod fetch;
pub mod logging;
pub mod mailer;
pub mod notify;
pub mod scrape;
pub mod services;
pub mod state;
pub mod utils;
pub mod web;
