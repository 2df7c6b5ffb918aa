//! CLI subcommand implementations.

pub mod consolidate;
pub mod filter;
pub mod import;
pub mod intervals;
pub mod report;
pub mod stats;
pub mod traces;
pub mod util;
