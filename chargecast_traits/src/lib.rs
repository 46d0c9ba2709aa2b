pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Device thermal pressure as reported by the host OS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThermalState {
    #[default]
    Nominal,
    Fair,
    Serious,
    Critical,
}

impl ThermalState {
    /// Serious and critical states throttle charging.
    #[inline]
    pub fn is_elevated(self) -> bool {
        matches!(self, ThermalState::Serious | ThermalState::Critical)
    }
}

/// One battery observation. SoC is the OS-reported integer percentage and is
/// validated by the engine, not here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub at: Instant,
    pub soc_percent: i32,
    pub is_charging: bool,
    pub thermal: ThermalState,
}

impl RawSample {
    pub fn new(at: Instant, soc_percent: i32, is_charging: bool) -> Self {
        Self {
            at,
            soc_percent,
            is_charging,
            thermal: ThermalState::Nominal,
        }
    }

    pub fn with_thermal(mut self, thermal: ThermalState) -> Self {
        self.thermal = thermal;
        self
    }
}

/// Source of battery observations (OS observer, sysfs, simulator).
pub trait BatteryMonitor {
    fn read(
        &mut self,
        at: Instant,
    ) -> Result<RawSample, Box<dyn std::error::Error + Send + Sync>>;
}
