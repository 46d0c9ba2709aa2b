//! Device battery profile and the watts ⇄ %/min conversion.
//!
//! `watts = k · capacity_ah · rate_pct_per_min` with `k = 0.6 · nominal_voltage`
//! (60 min/h over 100 %). The same factor is used in both directions so a
//! conversion round-trips exactly.

use serde::Serialize;

/// Conservative profile used until the real one resolves.
pub const DEFAULT_CAPACITY_MAH: u32 = 3000;
pub const DEFAULT_NOMINAL_VOLTAGE: f64 = 3.85;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeviceProfile {
    pub capacity_mah: u32,
    pub nominal_voltage: f64,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            capacity_mah: DEFAULT_CAPACITY_MAH,
            nominal_voltage: DEFAULT_NOMINAL_VOLTAGE,
        }
    }
}

impl DeviceProfile {
    pub fn new(capacity_mah: u32, nominal_voltage: f64) -> Self {
        Self {
            capacity_mah,
            nominal_voltage,
        }
    }

    /// Fall back to the default for unusable values instead of failing.
    pub fn sanitized(self) -> Self {
        let d = Self::default();
        Self {
            capacity_mah: if self.capacity_mah == 0 {
                d.capacity_mah
            } else {
                self.capacity_mah
            },
            nominal_voltage: if self.nominal_voltage.is_finite() && self.nominal_voltage > 0.0 {
                self.nominal_voltage
            } else {
                d.nominal_voltage
            },
        }
    }

    #[inline]
    fn capacity_ah(&self) -> f64 {
        f64::from(self.capacity_mah) / 1000.0
    }

    #[inline]
    fn k(&self) -> f64 {
        0.6 * self.nominal_voltage
    }

    /// Power implied by a charge rate in %/min.
    #[inline]
    pub fn watts_for_rate(&self, rate_pct_per_min: f64) -> f64 {
        self.k() * self.capacity_ah() * rate_pct_per_min
    }

    /// Charge rate in %/min implied by a power draw.
    #[inline]
    pub fn rate_for_watts(&self, watts: f64) -> f64 {
        let denom = self.k() * self.capacity_ah();
        if denom <= 0.0 { 0.0 } else { watts / denom }
    }
}
