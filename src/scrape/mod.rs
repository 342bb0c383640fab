//! The ingestion pipeline: link discovery, cause list parsing, differential
//! sync, and the scheduler that drives them.

pub mod discovery;
pub mod parser;
pub mod pipeline;
pub mod scheduler;
pub mod sync;

/// Published list dates and hearing times are local to this zone.
pub const LONDON: chrono_tz::Tz = chrono_tz::Europe::London;
