//! Long-running services and their lifecycle management.

pub mod manager;
pub mod scraper;
pub mod signals;
pub mod web;
