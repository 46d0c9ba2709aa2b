//! Battery observer over the Linux power-supply class.
//!
//! Reads `capacity`, `status` and, when present, `temp` from one supply
//! directory such as `/sys/class/power_supply/BAT0`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chargecast_traits::{BatteryMonitor, RawSample, ThermalState};

use crate::error::{DeviceError, Result};
use crate::util::{parse_capacity, parse_status, read_attr, thermal_from_decicelsius};

pub const POWER_SUPPLY_ROOT: &str = "/sys/class/power_supply";

#[derive(Debug, Clone)]
pub struct SysfsBattery {
    dir: PathBuf,
}

impl SysfsBattery {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// First supply under `root` whose `type` is `Battery`, by name order.
    pub fn discover(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let entries = std::fs::read_dir(root).map_err(|source| DeviceError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        let mut dirs: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
        dirs.sort();
        let found = dirs
            .into_iter()
            .find(|d| read_attr(&d.join("type")).is_ok_and(|t| t == "Battery"))
            .ok_or_else(|| DeviceError::NotFound(root.to_path_buf()))?;
        tracing::info!(dir = ?found, "battery discovered");
        Ok(Self::new(found))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn thermal(&self) -> ThermalState {
        let path = self.dir.join("temp");
        if !path.exists() {
            return ThermalState::Nominal;
        }
        match read_attr(&path).and_then(|raw| thermal_from_decicelsius(&raw)) {
            Ok(state) => state,
            Err(e) => {
                tracing::debug!(error = %e, "temp unreadable; assuming nominal");
                ThermalState::Nominal
            }
        }
    }

    pub fn sample(&self, at: Instant) -> Result<RawSample> {
        let soc = parse_capacity(&read_attr(&self.dir.join("capacity"))?)?;
        let charging = parse_status(&read_attr(&self.dir.join("status"))?)?;
        let thermal = self.thermal();
        tracing::debug!(soc, charging, ?thermal, "sysfs sample");
        Ok(RawSample::new(at, soc, charging).with_thermal(thermal))
    }
}

impl BatteryMonitor for SysfsBattery {
    fn read(&mut self, at: Instant) -> std::result::Result<RawSample, Box<dyn std::error::Error + Send + Sync>> {
        self.sample(at).map_err(|e| {
            tracing::error!(error = %e, "battery read error");
            Box::new(e) as Box<dyn std::error::Error + Send + Sync>
        })
    }
}
