//! Configuration types for the estimation pipeline.
//!
//! These are the runtime configuration structs used by the engine stages.
//! They are separate from the TOML-deserialized config in `chargecast_config`.

use std::time::Duration;

/// Sampler/smoother tuning.
#[derive(Debug, Clone)]
pub struct SmootherCfg {
    /// Fixed-rate period at the start of a session.
    pub warmup: Duration,
    /// Charger power assumed during warmup.
    pub warmup_watts: f64,
    /// EMA smoothing factor in (0.0, 1.0].
    pub ema_alpha: f64,
    /// Smoothed rate is clamped into `[min_rate, max_rate]` (%/min).
    pub min_rate: f64,
    pub max_rate: f64,
    /// Observer cadence; a tick interval above `expected_tick * data_gap_factor` is a gap.
    pub expected_tick: Duration,
    pub data_gap_factor: f64,
    /// No real step for this long marks the estimate stale.
    pub stale_step: Duration,
}

impl Default for SmootherCfg {
    fn default() -> Self {
        Self {
            warmup: Duration::from_secs(90),
            warmup_watts: 10.0,
            ema_alpha: 0.25,
            min_rate: 0.05,
            max_rate: 3.0,
            expected_tick: Duration::from_secs(30),
            data_gap_factor: 2.5,
            stale_step: Duration::from_secs(600),
        }
    }
}

/// Pause/anomaly detector tuning.
#[derive(Debug, Clone)]
pub struct DetectorCfg {
    /// Optimized-charging plateau band, inclusive, in percent.
    pub optimized_band: (i32, i32),
    pub optimized_dwell: Duration,
    pub trickle_watts: f64,
    pub spike_ceiling_min: u32,
    pub spike_ratio: f64,
    pub enter_ticks_thermal: u8,
    pub enter_ticks_optimized: u8,
    pub enter_ticks_spike: u8,
    pub exit_ticks: u8,
}

impl Default for DetectorCfg {
    fn default() -> Self {
        Self {
            optimized_band: (75, 88),
            optimized_dwell: Duration::from_secs(60),
            trickle_watts: 4.5,
            spike_ceiling_min: 300,
            spike_ratio: 3.0,
            enter_ticks_thermal: 2,
            enter_ticks_optimized: 3,
            enter_ticks_spike: 4,
            exit_ticks: 3,
        }
    }
}

/// Presentation quarantine and slew limits.
#[derive(Debug, Clone)]
pub struct PresenterCfg {
    pub min_interval: Duration,
    /// A candidate is "big" at or above this many minutes...
    pub big_eta_min: u32,
    /// ...or at or above this multiple of the last stable value.
    pub big_ratio: f64,
    pub trickle_watts: f64,
    /// Identical consecutive candidates required to accept a big jump.
    pub confirm_count: u8,
    pub rise_floor_min: u32,
    pub rise_ratio: f64,
    pub fall_floor_min: u32,
    pub fall_ratio: f64,
}

impl Default for PresenterCfg {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(900),
            big_eta_min: 180,
            big_ratio: 2.0,
            trickle_watts: 4.5,
            confirm_count: 2,
            rise_floor_min: 2,
            rise_ratio: 0.15,
            fall_floor_min: 3,
            fall_ratio: 0.30,
        }
    }
}

/// Throttling for the persisted series.
#[derive(Debug, Clone)]
pub struct PersistCfg {
    /// Minimum spacing between measured rows.
    pub min_gap: Duration,
    pub retention_days: u32,
}

impl Default for PersistCfg {
    fn default() -> Self {
        Self {
            min_gap: Duration::from_secs(5),
            retention_days: 30,
        }
    }
}

/// Session-level timing.
#[derive(Debug, Clone)]
pub struct SessionCfg {
    /// Delay before an observed unplug ends the session.
    pub unplug_confirm: Duration,
    /// Snapshot fan-out debounce window.
    pub snapshot_debounce: Duration,
}

impl Default for SessionCfg {
    fn default() -> Self {
        Self {
            unplug_confirm: Duration::from_millis(800),
            snapshot_debounce: Duration::from_millis(600),
        }
    }
}
