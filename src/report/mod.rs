//! Report rendering for aggregate and chart responses.

pub mod generator;

pub use generator::*;
