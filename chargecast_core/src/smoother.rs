//! Rate smoother: turns 5%-granular SoC reports into a continuous estimate.
//!
//! A session starts with a warmup window at a fixed power assumption, then
//! switches to an EMA of observed step rates. Between OS steps the estimate
//! interpolates toward the next 5% boundary without overshooting it or
//! falling below the last real reading.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::SmootherCfg;
use crate::profile::DeviceProfile;
use crate::util::{STEP_PCT, minutes_between, next_boundary, round_minutes, whole_secs};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateSource {
    Warmup,
    Interpolated,
    ActualStep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Warmup,
    Seeded,
    Good,
    StaleStep,
    DataGap,
}

/// Per-tick smoother output. Intermediate only; never persisted verbatim.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothedEstimate {
    pub estimated_percent: f64,
    pub rate_pct_per_min: f64,
    pub watts: f64,
    pub minutes_to_full: Option<u32>,
    pub source: EstimateSource,
    pub is_first_step_this_session: bool,
    pub delta_time: Duration,
    pub data_gap: bool,
    pub secs_since_last_real_step: u32,
    pub confidence: Confidence,
}

impl SmoothedEstimate {
    #[inline]
    pub fn in_warmup(&self) -> bool {
        self.confidence == Confidence::Warmup
    }

    #[inline]
    pub fn is_stale(&self) -> bool {
        self.confidence == Confidence::StaleStep
    }
}

#[derive(Debug)]
pub struct Smoother {
    cfg: SmootherCfg,
    profile: DeviceProfile,
    active: bool,
    session_start: Option<Instant>,
    in_warmup: bool,
    warmup_rate: f64,
    ema_rate: f64,
    steps_seen: u32,
    last_step_pct: i32,
    last_step_at: Option<Instant>,
    next_boundary: i32,
    estimated: f64,
    last_soc: i32,
    last_tick_at: Option<Instant>,
}

impl Smoother {
    pub fn new(cfg: SmootherCfg, profile: DeviceProfile) -> Self {
        let profile = profile.sanitized();
        let warmup_rate = profile.rate_for_watts(cfg.warmup_watts);
        Self {
            cfg,
            profile,
            active: false,
            session_start: None,
            in_warmup: false,
            warmup_rate,
            ema_rate: 0.0,
            steps_seen: 0,
            last_step_pct: 0,
            last_step_at: None,
            next_boundary: 0,
            estimated: 0.0,
            last_soc: 0,
            last_tick_at: None,
        }
    }

    pub fn profile(&self) -> DeviceProfile {
        self.profile
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn in_warmup(&self) -> bool {
        self.active && self.in_warmup
    }

    pub fn estimated_percent(&self) -> f64 {
        self.estimated
    }

    /// Smoothed EMA rate in %/min (0 until the first real step).
    pub fn ema_rate(&self) -> f64 {
        self.ema_rate
    }

    /// Swap in the resolved device profile. The %/min rate (and therefore
    /// the ETA) stays continuous; only the watts conversion changes.
    pub fn set_profile(&mut self, profile: DeviceProfile) {
        let profile = profile.sanitized();
        if profile == self.profile {
            return;
        }
        tracing::debug!(
            capacity_mah = profile.capacity_mah,
            nominal_voltage = profile.nominal_voltage,
            "device profile reconciled"
        );
        self.profile = profile;
        if !self.active {
            self.warmup_rate = profile.rate_for_watts(self.cfg.warmup_watts);
        }
    }

    /// Start a charging session at `soc_percent`.
    pub fn begin(&mut self, soc_percent: i32, now: Instant) {
        let soc = soc_percent.clamp(0, 100);
        self.active = true;
        self.session_start = Some(now);
        self.warmup_rate = self.profile.rate_for_watts(self.cfg.warmup_watts);
        self.in_warmup = !self.cfg.warmup.is_zero();
        self.ema_rate = 0.0;
        self.steps_seen = 0;
        self.last_step_pct = soc;
        self.last_step_at = Some(now);
        self.next_boundary = next_boundary(soc);
        self.estimated = f64::from(soc);
        self.last_soc = soc;
        self.last_tick_at = Some(now);
        tracing::debug!(
            soc,
            next_boundary = self.next_boundary,
            warmup_rate = self.warmup_rate,
            "smoother session begin"
        );
    }

    /// Snap back to the raw SoC and drop all session history.
    pub fn end(&mut self, _now: Instant) {
        self.estimated = f64::from(self.last_soc);
        self.active = false;
        self.session_start = None;
        self.in_warmup = false;
        self.ema_rate = 0.0;
        self.steps_seen = 0;
        self.last_step_at = None;
        self.last_tick_at = None;
        self.next_boundary = next_boundary(self.last_soc);
    }

    /// One estimator iteration.
    pub fn tick(&mut self, soc_percent: i32, is_charging: bool, now: Instant) -> SmoothedEstimate {
        let soc = soc_percent.clamp(0, 100);
        let delta = self
            .last_tick_at
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or(Duration::ZERO);
        let data_gap = delta.as_secs_f64() > self.gap_threshold_secs();
        self.last_tick_at = Some(now);

        if !is_charging {
            self.last_soc = soc;
            self.estimated = f64::from(soc);
            return SmoothedEstimate {
                estimated_percent: self.estimated,
                rate_pct_per_min: 0.0,
                watts: 0.0,
                minutes_to_full: None,
                source: EstimateSource::Interpolated,
                is_first_step_this_session: false,
                delta_time: delta,
                data_gap,
                secs_since_last_real_step: self.secs_since_step(now),
                confidence: if data_gap {
                    Confidence::DataGap
                } else {
                    Confidence::Good
                },
            };
        }

        if !self.active {
            tracing::debug!(soc, "tick while idle; starting session implicitly");
            self.begin(soc, now);
        }

        if self.in_warmup
            && let Some(start) = self.session_start
            && now.saturating_duration_since(start) >= self.cfg.warmup
        {
            self.in_warmup = false;
            tracing::debug!(soc, "warmup window elapsed");
        }

        let mut source = if self.in_warmup {
            EstimateSource::Warmup
        } else {
            EstimateSource::Interpolated
        };
        let mut first_step = false;

        if soc >= self.last_step_pct + STEP_PCT {
            first_step = self.steps_seen == 0;
            self.observe_step(soc, now);
            source = EstimateSource::ActualStep;
        } else if soc < self.last_step_pct {
            tracing::debug!(
                soc,
                last_step = self.last_step_pct,
                "SoC fell while charging; re-anchoring"
            );
            self.last_step_pct = soc;
            self.estimated = f64::from(soc);
            self.next_boundary = next_boundary(soc);
        } else {
            let rate = self.current_rate();
            let boundary = f64::from(self.next_boundary.max(next_boundary(soc)));
            let advanced = self.estimated + rate * delta.as_secs_f64() / 60.0;
            self.estimated = advanced.min(boundary).max(f64::from(soc));
        }
        self.last_soc = soc;

        let rate = self.current_rate();
        let watts = self.profile.watts_for_rate(rate);
        let minutes_to_full = if soc >= 100 || self.estimated >= 100.0 {
            Some(0)
        } else if rate > 0.0 {
            round_minutes((100.0 - self.estimated) / rate)
        } else {
            None
        };
        let since_step = self.secs_since_step(now);

        let confidence = if self.in_warmup {
            Confidence::Warmup
        } else if self.steps_seen == 0 {
            Confidence::Seeded
        } else if data_gap {
            Confidence::DataGap
        } else if u64::from(since_step) > self.cfg.stale_step.as_secs() {
            Confidence::StaleStep
        } else {
            Confidence::Good
        };

        tracing::trace!(
            soc,
            estimated = self.estimated,
            rate,
            watts,
            ?minutes_to_full,
            ?source,
            ?confidence,
            "smoother tick"
        );

        SmoothedEstimate {
            estimated_percent: self.estimated,
            rate_pct_per_min: rate,
            watts,
            minutes_to_full,
            source,
            is_first_step_this_session: first_step,
            delta_time: delta,
            data_gap,
            secs_since_last_real_step: since_step,
            confidence,
        }
    }

    fn observe_step(&mut self, soc: i32, now: Instant) {
        let elapsed_min = self
            .last_step_at
            .map(|t| minutes_between(t, now))
            .unwrap_or(0.0);
        let delta_pct = f64::from(soc - self.last_step_pct);
        if elapsed_min > 0.0 {
            let observed = delta_pct / elapsed_min;
            let alpha = self.cfg.ema_alpha.clamp(0.0, 1.0);
            let y = alpha * observed + (1.0 - alpha) * self.ema_rate;
            self.ema_rate = y.clamp(self.cfg.min_rate, self.cfg.max_rate);
            tracing::debug!(
                soc,
                observed,
                ema = self.ema_rate,
                elapsed_min,
                "real step observed"
            );
        }
        self.steps_seen = self.steps_seen.saturating_add(1);
        if self.in_warmup {
            tracing::debug!(soc, "warmup ended early by real step");
        }
        self.in_warmup = false;
        self.last_step_pct = soc;
        self.last_step_at = Some(now);
        self.estimated = f64::from(soc);
        self.next_boundary = next_boundary(soc);
    }

    #[inline]
    fn current_rate(&self) -> f64 {
        if self.in_warmup || self.steps_seen == 0 {
            self.warmup_rate
        } else {
            self.ema_rate
        }
    }

    #[inline]
    fn gap_threshold_secs(&self) -> f64 {
        self.cfg.expected_tick.as_secs_f64() * self.cfg.data_gap_factor
    }

    #[inline]
    fn secs_since_step(&self, now: Instant) -> u32 {
        self.last_step_at
            .map(|t| whole_secs(now.saturating_duration_since(t)))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_never_passes_boundary() {
        let mut s = Smoother::new(SmootherCfg::default(), DeviceProfile::default());
        let t0 = Instant::now();
        s.begin(40, t0);
        let mut last = 40.0;
        for i in 1..=20u64 {
            let e = s.tick(40, true, t0 + Duration::from_secs(30 * i));
            assert!(e.estimated_percent <= 45.0);
            assert!(e.estimated_percent >= last);
            last = e.estimated_percent;
        }
        assert!((last - 45.0).abs() < 1e-9);
    }

    #[test]
    fn end_snaps_to_raw() {
        let mut s = Smoother::new(SmootherCfg::default(), DeviceProfile::default());
        let t0 = Instant::now();
        s.begin(60, t0);
        s.tick(60, true, t0 + Duration::from_secs(60));
        assert!(s.estimated_percent() > 60.0);
        s.end(t0 + Duration::from_secs(61));
        assert_eq!(s.estimated_percent(), 60.0);
        assert!(!s.is_active());
    }
}
