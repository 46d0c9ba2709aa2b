#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Durable, session-scoped charging time series on SQLite.
//!
//! - `TimeSeriesStore`: synchronous access, idempotent writes, retention trim.
//! - `SeriesWorker`: owns a store on its own thread and implements
//!   `chargecast_core::SeriesWriter` so the engine only ever enqueues.

pub mod error;
mod migrations;
pub mod store;
pub mod worker;

pub use error::StoreError;
pub use store::{SeriesChanged, TimeSeriesStore};
pub use worker::SeriesWorker;
