#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Battery observers implementing `chargecast_traits::BatteryMonitor`.

pub mod error;
pub mod simulated;
pub mod sysfs;
pub mod util;

pub use error::DeviceError;
pub use simulated::SimulatedBattery;
pub use sysfs::{POWER_SUPPLY_ROOT, SysfsBattery};
