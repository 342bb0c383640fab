//! Web API module for the causelist application.

pub mod error;
pub mod hearings;
pub mod routes;
pub mod status;

pub use routes::*;
