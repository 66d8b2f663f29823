//! Forecasting service access.
//!
//! The client posts JSON to the service; the dispatcher turns each
//! monthly series into a request and the reply into a forecast slot.

pub mod client;
pub mod dispatcher;

pub use client::{ForecastApi, ForecastClient, ForecastConfig};
pub use dispatcher::{SeriesForecastDispatcher, SeriesPayload};
