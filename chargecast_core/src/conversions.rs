//! `From` implementations bridging `chargecast_config` types to `chargecast_core` types.
//!
//! File values are `f32` and whole units; runtime types use `f64` and `Duration`.

use std::time::Duration;

use crate::config::{DetectorCfg, PersistCfg, PresenterCfg, SessionCfg, SmootherCfg};
use crate::profile::DeviceProfile;

// ── DeviceProfile ────────────────────────────────────────────────────────────

impl From<&chargecast_config::DeviceCfg> for DeviceProfile {
    fn from(c: &chargecast_config::DeviceCfg) -> Self {
        Self {
            capacity_mah: c.capacity_mah,
            nominal_voltage: f64::from(c.nominal_voltage),
        }
        .sanitized()
    }
}

// ── SmootherCfg ──────────────────────────────────────────────────────────────

impl From<&chargecast_config::SmootherCfg> for SmootherCfg {
    fn from(c: &chargecast_config::SmootherCfg) -> Self {
        Self {
            warmup: Duration::from_secs(c.warmup_secs),
            warmup_watts: f64::from(c.warmup_watts),
            ema_alpha: f64::from(c.ema_alpha),
            min_rate: f64::from(c.min_rate_pct_per_min),
            max_rate: f64::from(c.max_rate_pct_per_min),
            expected_tick: Duration::from_secs(c.expected_tick_secs),
            data_gap_factor: f64::from(c.data_gap_factor),
            stale_step: Duration::from_secs(c.stale_step_secs),
        }
    }
}

// ── DetectorCfg ──────────────────────────────────────────────────────────────

impl From<&chargecast_config::DetectorCfg> for DetectorCfg {
    fn from(c: &chargecast_config::DetectorCfg) -> Self {
        Self {
            optimized_band: (c.optimized_low_pct, c.optimized_high_pct),
            optimized_dwell: Duration::from_secs(c.optimized_dwell_secs),
            trickle_watts: f64::from(c.trickle_watts),
            spike_ceiling_min: c.spike_ceiling_min,
            spike_ratio: f64::from(c.spike_ratio),
            enter_ticks_thermal: c.enter_ticks_thermal,
            enter_ticks_optimized: c.enter_ticks_optimized,
            enter_ticks_spike: c.enter_ticks_spike,
            exit_ticks: c.exit_ticks,
        }
    }
}

// ── PresenterCfg ─────────────────────────────────────────────────────────────

impl From<&chargecast_config::PresenterCfg> for PresenterCfg {
    fn from(c: &chargecast_config::PresenterCfg) -> Self {
        Self {
            min_interval: Duration::from_millis(c.min_interval_ms),
            big_eta_min: c.big_eta_min,
            big_ratio: f64::from(c.big_ratio),
            trickle_watts: f64::from(c.trickle_watts),
            confirm_count: c.confirm_count,
            rise_floor_min: c.rise_floor_min,
            rise_ratio: f64::from(c.rise_ratio),
            fall_floor_min: c.fall_floor_min,
            fall_ratio: f64::from(c.fall_ratio),
        }
    }
}

// ── PersistCfg ───────────────────────────────────────────────────────────────

impl From<&chargecast_config::PersistenceCfg> for PersistCfg {
    fn from(c: &chargecast_config::PersistenceCfg) -> Self {
        Self {
            min_gap: Duration::from_secs(c.min_gap_secs),
            retention_days: c.retention_days,
        }
    }
}

// ── SessionCfg ───────────────────────────────────────────────────────────────

impl From<&chargecast_config::SessionCfg> for SessionCfg {
    fn from(c: &chargecast_config::SessionCfg) -> Self {
        Self {
            unplug_confirm: Duration::from_millis(c.unplug_confirm_ms),
            snapshot_debounce: Duration::from_millis(c.snapshot_debounce_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_agree_with_file_defaults() {
        let file = chargecast_config::Config::default();
        let d = DetectorCfg::from(&file.detector);
        assert_eq!(d.optimized_band, DetectorCfg::default().optimized_band);
        assert_eq!(d.enter_ticks_spike, 4);
        let s = SmootherCfg::from(&file.smoother);
        assert_eq!(s.warmup, Duration::from_secs(90));
        assert!((s.ema_alpha - 0.25).abs() < 1e-9);
        let sess = SessionCfg::from(&file.session);
        assert_eq!(sess.unplug_confirm, Duration::from_millis(800));
        let p = DeviceProfile::from(&file.device);
        assert_eq!(p.capacity_mah, 3000);
        assert!((p.nominal_voltage - 3.85).abs() < 1e-6);
    }
}
