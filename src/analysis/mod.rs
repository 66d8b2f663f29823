//! Analysis modules.
//!
//! Monthly bucketing of normalized records and summary statistics.

pub mod aggregator;

pub use aggregator::*;
