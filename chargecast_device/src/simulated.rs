//! Deterministic charging curve for demos and tests.
//!
//! The level is integrated from the elapsed time between reads, so the same
//! read instants always produce the same samples. Readings are quantized to
//! the OS step (5 % by default), like a real coarse observer.

use std::time::{Duration, Instant};

use chargecast_traits::{BatteryMonitor, RawSample, ThermalState};

/// SoC above which the curve tapers toward the trickle floor at 100 %.
const TAPER_START: f64 = 80.0;
/// Fraction of charger power left at 100 %.
const TAPER_FLOOR: f64 = 0.3;

#[derive(Debug, Clone)]
pub struct SimulatedBattery {
    level: f64,
    charger_watts: f64,
    capacity_mah: u32,
    nominal_voltage: f64,
    step: i32,
    hold: Option<(f64, Duration)>,
    held_for: Duration,
    thermal: Vec<(Duration, ThermalState)>,
    unplug_after: Option<Duration>,
    origin: Option<Instant>,
    last: Option<Instant>,
}

impl SimulatedBattery {
    pub fn new(start_soc: i32) -> Self {
        Self {
            level: f64::from(start_soc.clamp(0, 100)),
            charger_watts: 10.0,
            capacity_mah: 3000,
            nominal_voltage: 3.85,
            step: 5,
            hold: None,
            held_for: Duration::ZERO,
            thermal: Vec::new(),
            unplug_after: None,
            origin: None,
            last: None,
        }
    }

    pub fn with_profile(mut self, capacity_mah: u32, nominal_voltage: f64) -> Self {
        self.capacity_mah = capacity_mah.max(1);
        self.nominal_voltage = nominal_voltage.max(0.1);
        self
    }

    pub fn with_charger_watts(mut self, watts: f64) -> Self {
        self.charger_watts = watts.max(0.0);
        self
    }

    /// Reporting granularity in percent (1 reports every percent).
    pub fn with_step(mut self, pct: i32) -> Self {
        self.step = pct.clamp(1, 100);
        self
    }

    /// Stop at `soc` for `dur`, the way OS charge optimization does.
    pub fn with_hold(mut self, soc: i32, dur: Duration) -> Self {
        self.hold = Some((f64::from(soc), dur));
        self
    }

    /// Report `state` from `after` (since the first read) onwards.
    pub fn with_thermal_at(mut self, after: Duration, state: ThermalState) -> Self {
        self.thermal.push((after, state));
        self.thermal.sort_by_key(|(t, _)| *t);
        self
    }

    pub fn unplug_after(mut self, after: Duration) -> Self {
        self.unplug_after = Some(after);
        self
    }

    /// Percent per minute at the current level.
    fn rate_now(&self, thermal: ThermalState) -> f64 {
        let ah = f64::from(self.capacity_mah) / 1000.0;
        let base = self.charger_watts / (0.6 * self.nominal_voltage * ah);
        let taper = if self.level > TAPER_START {
            let span = (self.level - TAPER_START) / (100.0 - TAPER_START);
            1.0 - span * (1.0 - TAPER_FLOOR)
        } else {
            1.0
        };
        let throttle = if thermal.is_elevated() { 0.5 } else { 1.0 };
        base * taper * throttle
    }

    fn thermal_at(&self, since_origin: Duration) -> ThermalState {
        self.thermal
            .iter()
            .rev()
            .find(|(t, _)| *t <= since_origin)
            .map(|(_, s)| *s)
            .unwrap_or_default()
    }

    fn reported_soc(&self) -> i32 {
        let level = self.level.clamp(0.0, 100.0) as i32;
        if level >= 100 { 100 } else { level - level % self.step }
    }

    fn integrate(&mut self, dt: Duration, thermal: ThermalState) {
        if let Some((at, dur)) = self.hold
            && self.level >= at
            && self.held_for < dur
        {
            self.held_for += dt;
            return;
        }
        let gained = self.rate_now(thermal) * dt.as_secs_f64() / 60.0;
        let mut next = (self.level + gained).min(100.0);
        // A pending hold catches the level at its threshold.
        if let Some((at, dur)) = self.hold
            && self.level < at
            && next > at
            && self.held_for < dur
        {
            next = at;
        }
        self.level = next;
    }
}

impl BatteryMonitor for SimulatedBattery {
    fn read(&mut self, at: Instant) -> Result<RawSample, Box<dyn std::error::Error + Send + Sync>> {
        let origin = *self.origin.get_or_insert(at);
        let since_origin = at.saturating_duration_since(origin);
        let thermal = self.thermal_at(since_origin);
        let charging = self.unplug_after.is_none_or(|u| since_origin < u);

        if charging && let Some(last) = self.last {
            self.integrate(at.saturating_duration_since(last), thermal);
        }
        self.last = Some(at);

        let soc = self.reported_soc();
        tracing::trace!(level = self.level, soc, charging, "simulated battery read");
        Ok(RawSample::new(at, soc, charging).with_thermal(thermal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_rate_matches_ten_watts() {
        let b = SimulatedBattery::new(40);
        let rate = b.rate_now(ThermalState::Nominal);
        assert!((rate - 1.443).abs() < 1e-3, "rate {rate}");
    }

    #[test]
    fn taper_slows_near_full() {
        let mut b = SimulatedBattery::new(90);
        let mid = b.rate_now(ThermalState::Nominal);
        b.level = 50.0;
        assert!(mid < b.rate_now(ThermalState::Nominal));
    }
}
