use std::fs;
use std::path::Path;
use std::time::Instant;

use chargecast_device::util::{parse_capacity, parse_status, thermal_from_decicelsius};
use chargecast_device::{DeviceError, SysfsBattery};
use chargecast_traits::{BatteryMonitor, ThermalState};
use rstest::rstest;

fn supply(root: &Path, name: &str, kind: &str, attrs: &[(&str, &str)]) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("type"), format!("{kind}\n")).unwrap();
    for (k, v) in attrs {
        fs::write(dir.join(k), format!("{v}\n")).unwrap();
    }
}

#[test]
fn discovers_first_battery() {
    let root = tempfile::tempdir().unwrap();
    supply(root.path(), "AC", "Mains", &[]);
    supply(root.path(), "BAT1", "Battery", &[("capacity", "55"), ("status", "Charging")]);
    supply(root.path(), "BAT0", "Battery", &[("capacity", "72"), ("status", "Discharging")]);

    let mut b = SysfsBattery::discover(root.path()).unwrap();
    assert!(b.dir().ends_with("BAT0"));
    let s = b.read(Instant::now()).unwrap();
    assert_eq!(s.soc_percent, 72);
    assert!(!s.is_charging);
    assert_eq!(s.thermal, ThermalState::Nominal);
}

#[test]
fn no_battery_is_not_found() {
    let root = tempfile::tempdir().unwrap();
    supply(root.path(), "AC", "Mains", &[]);
    assert!(matches!(
        SysfsBattery::discover(root.path()),
        Err(DeviceError::NotFound(_))
    ));
}

#[test]
fn temp_maps_to_thermal_state() {
    let root = tempfile::tempdir().unwrap();
    supply(
        root.path(),
        "BAT0",
        "Battery",
        &[("capacity", "80"), ("status", "Full"), ("temp", "463")],
    );
    let b = SysfsBattery::new(root.path().join("BAT0"));
    let s = b.sample(Instant::now()).unwrap();
    assert!(s.is_charging);
    assert_eq!(s.thermal, ThermalState::Serious);
}

#[test]
fn missing_capacity_is_an_io_error() {
    let root = tempfile::tempdir().unwrap();
    supply(root.path(), "BAT0", "Battery", &[("status", "Charging")]);
    let mut b = SysfsBattery::new(root.path().join("BAT0"));
    let err = b.read(Instant::now()).unwrap_err();
    assert!(err.to_string().contains("capacity"));
}

#[rstest]
#[case("Charging", true)]
#[case("Full", true)]
#[case("Discharging", false)]
#[case("Not charging", false)]
fn status_values(#[case] raw: &str, #[case] plugged: bool) {
    assert_eq!(parse_status(raw).unwrap(), plugged);
}

#[rstest]
#[case("250", ThermalState::Nominal)]
#[case("400", ThermalState::Fair)]
#[case("499", ThermalState::Serious)]
#[case("512", ThermalState::Critical)]
fn temp_thresholds(#[case] raw: &str, #[case] expected: ThermalState) {
    assert_eq!(thermal_from_decicelsius(raw).unwrap(), expected);
}

#[test]
fn garbage_is_a_parse_error() {
    assert!(matches!(
        parse_capacity("n/a"),
        Err(DeviceError::Parse { attr: "capacity", .. })
    ));
    assert!(parse_status("Charged").is_err());
}
