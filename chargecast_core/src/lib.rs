#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Charging estimation core (platform-agnostic).
//!
//! This crate turns a coarse stream of battery samples into a stable
//! power/rate/time-to-full estimate. Platform access goes through
//! `chargecast_traits::BatteryMonitor`; persistence goes through
//! [`SeriesWriter`].
//!
//! ## Pipeline
//!
//! - **Smoother**: warmup rate, EMA over real 5% steps, boundary interpolation (`smoother`)
//! - **Detector**: thermal / optimized-charging / spike pauses with hysteresis (`detector`)
//! - **Presenter**: idempotency, dedup, quarantine and slew limiting (`presenter`)
//! - **Snapshot**: the single canonical `ChargingSnapshot` and its fan-out (`snapshot`)
//! - **Engine**: session lifecycle, unplug confirmation, throttled persistence (`engine`)
//!
//! Data flows one way, raw sample to snapshot, through immutable value records.

pub mod builder;
pub mod collab_error;
pub mod config;
pub mod conversions;
pub mod detector;
pub mod engine;
pub mod error;
pub mod mocks;
pub mod notify;
pub mod persist;
pub mod presenter;
pub mod profile;
pub mod runner;
pub mod sampler;
pub mod smoother;
pub mod snapshot;
pub mod unplug;
pub mod util;

pub use builder::EngineBuilder;
pub use config::{DetectorCfg, PersistCfg, PresenterCfg, SessionCfg, SmootherCfg};
pub use detector::{DisplayEta, PauseDetector, PauseReason, PauseStatus};
pub use engine::{ChargeEngine, TickReport};
pub use error::{BuildError, ChargeError, RejectReason, Result};
pub use notify::Coalescer;
pub use persist::{PersistedRow, RowEvent, RowSource, SeriesWriter, SessionId};
pub use presenter::{EtaPresenter, PresentedOutput, PresenterInput, PresenterState, TickToken};
pub use profile::DeviceProfile;
pub use smoother::{Confidence, EstimateSource, SmoothedEstimate, Smoother};
pub use snapshot::{ChargeState, ChargingSnapshot, SnapshotCandidate, SnapshotReader, SnapshotStore};
pub use unplug::{UnplugGate, UnplugTicket};
