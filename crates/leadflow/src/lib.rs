//! Lead distribution and auto-assignment engine for the junk-removal quote marketplace.

pub mod config;
pub mod distribution;
pub mod error;
pub mod telemetry;
