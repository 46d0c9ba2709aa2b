//! Parsing and read helpers for power-supply attribute files.

use std::io::ErrorKind;
use std::path::Path;

use chargecast_traits::ThermalState;

use crate::error::{DeviceError, Result};

/// Attempts per attribute read before giving up on a transient error.
pub const READ_ATTEMPTS: u32 = 3;

fn is_transient(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

/// Read an attribute file, retrying transient failures. The value is trimmed.
pub fn read_attr(path: &Path) -> Result<String> {
    let mut attempts = 0;
    loop {
        match std::fs::read_to_string(path) {
            Ok(s) => return Ok(s.trim().to_string()),
            Err(e) if is_transient(e.kind()) && attempts + 1 < READ_ATTEMPTS => {
                attempts += 1;
                tracing::warn!(path = ?path, retries = attempts, error = %e, "attribute read failed, retrying");
            }
            Err(source) => {
                return Err(DeviceError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
    }
}

/// `capacity` is an integer percentage. Out-of-range values are passed through
/// for the engine to reject.
pub fn parse_capacity(raw: &str) -> Result<i32> {
    raw.trim().parse::<i32>().map_err(|_| DeviceError::Parse {
        attr: "capacity",
        value: raw.to_string(),
    })
}

/// Whether external power is feeding the battery. `Full` counts as plugged in.
pub fn parse_status(raw: &str) -> Result<bool> {
    match raw.trim() {
        "Charging" | "Full" => Ok(true),
        "Discharging" | "Not charging" | "Unknown" => Ok(false),
        other => Err(DeviceError::Parse {
            attr: "status",
            value: other.to_string(),
        }),
    }
}

/// Map a `temp` reading (tenths of a degree Celsius) to a thermal state.
pub fn thermal_from_decicelsius(raw: &str) -> Result<ThermalState> {
    let deci: i32 = raw.trim().parse().map_err(|_| DeviceError::Parse {
        attr: "temp",
        value: raw.to_string(),
    })?;
    Ok(match deci {
        i32::MIN..400 => ThermalState::Nominal,
        400..450 => ThermalState::Fair,
        450..500 => ThermalState::Serious,
        _ => ThermalState::Critical,
    })
}
