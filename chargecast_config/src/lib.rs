#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and trace parsing for the charge estimator.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//!   Every section is optional; an empty document yields the defaults.
//! - The trace CSV loader enforces headers and monotonic timestamps so that
//!   replayed sessions behave like a live battery observer.
use chargecast_traits::ThermalState;
use serde::Deserialize;

/// Trace CSV schema.
///
/// Expected headers:
/// ts,soc,charging,thermal
///
/// Example:
/// ts,soc,charging,thermal
/// 1700000000,40,true,nominal
/// 1700000030,40,true,nominal
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct TraceRow {
    /// Seconds since the UNIX epoch.
    pub ts: f64,
    pub soc: i32,
    pub charging: bool,
    #[serde(default)]
    pub thermal: ThermalState,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DeviceCfg {
    pub capacity_mah: u32,
    pub nominal_voltage: f32,
}

impl Default for DeviceCfg {
    fn default() -> Self {
        Self {
            capacity_mah: 3000,
            nominal_voltage: 3.85,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SmootherCfg {
    pub warmup_secs: u64,
    /// Assumed charger power during warmup; converted to %/min per device.
    pub warmup_watts: f32,
    pub ema_alpha: f32,
    pub min_rate_pct_per_min: f32,
    pub max_rate_pct_per_min: f32,
    /// Expected observer cadence; drives data-gap detection.
    pub expected_tick_secs: u64,
    pub data_gap_factor: f32,
    pub stale_step_secs: u64,
}

impl Default for SmootherCfg {
    fn default() -> Self {
        Self {
            warmup_secs: 90,
            warmup_watts: 10.0,
            ema_alpha: 0.25,
            min_rate_pct_per_min: 0.05,
            max_rate_pct_per_min: 3.0,
            expected_tick_secs: 30,
            data_gap_factor: 2.5,
            stale_step_secs: 600,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DetectorCfg {
    /// Optimized-charging band, inclusive.
    pub optimized_low_pct: i32,
    pub optimized_high_pct: i32,
    /// SoC must be unchanged this long before the plateau qualifies.
    pub optimized_dwell_secs: u64,
    pub trickle_watts: f32,
    pub spike_ceiling_min: u32,
    pub spike_ratio: f32,
    pub enter_ticks_thermal: u8,
    pub enter_ticks_optimized: u8,
    pub enter_ticks_spike: u8,
    pub exit_ticks: u8,
}

impl Default for DetectorCfg {
    fn default() -> Self {
        Self {
            optimized_low_pct: 75,
            optimized_high_pct: 88,
            optimized_dwell_secs: 60,
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PresenterCfg {
    pub min_interval_ms: u64,
    pub big_eta_min: u32,
    pub big_ratio: f32,
    pub trickle_watts: f32,
    pub confirm_count: u8,
    pub rise_floor_min: u32,
    pub rise_ratio: f32,
    pub fall_floor_min: u32,
    pub fall_ratio: f32,
}

impl Default for PresenterCfg {
    fn default() -> Self {
        Self {
            min_interval_ms: 900,
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PersistenceCfg {
    /// SQLite file; `None` keeps persistence disabled.
    pub path: Option<String>,
    pub min_gap_secs: u64,
    pub retention_days: u32,
    pub notify_coalesce_ms: u64,
}

impl Default for PersistenceCfg {
    fn default() -> Self {
        Self {
            path: None,
            min_gap_secs: 5,
            retention_days: 30,
            notify_coalesce_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionCfg {
    pub unplug_confirm_ms: u64,
    pub snapshot_debounce_ms: u64,
}

impl Default for SessionCfg {
    fn default() -> Self {
        Self {
            unplug_confirm_ms: 800,
            snapshot_debounce_ms: 600,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub device: DeviceCfg,
    pub smoother: SmootherCfg,
    pub detector: DetectorCfg,
    pub presenter: PresenterCfg,
    pub persistence: PersistenceCfg,
    pub session: SessionCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

pub fn load_trace_csv(path: &std::path::Path) -> eyre::Result<Vec<TraceRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open trace CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    let full = ["ts", "soc", "charging", "thermal"];
    let short = ["ts", "soc", "charging"];
    if actual != full && actual != short {
        eyre::bail!(
            "trace CSV must have headers 'ts,soc,charging[,thermal]', got: {}",
            actual.join(",")
        );
    }

    let mut rows: Vec<TraceRow> = Vec::new();
    for (idx, rec) in rdr.deserialize::<TraceRow>().enumerate() {
        let row = match rec {
            Ok(row) => row,
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        };
        if !row.ts.is_finite() {
            eyre::bail!("invalid CSV row {}: non-finite timestamp", idx + 2);
        }
        if let Some(prev) = rows.last()
            && row.ts < prev.ts
        {
            eyre::bail!(
                "trace timestamps must be non-decreasing (row {} goes back in time)",
                idx + 2
            );
        }
        rows.push(row);
    }
    if rows.is_empty() {
        eyre::bail!("trace CSV {:?} has no samples", path);
    }
    Ok(rows)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Device
        if self.device.capacity_mah == 0 {
            eyre::bail!("device.capacity_mah must be > 0");
        }
        if !(self.device.nominal_voltage > 0.0 && self.device.nominal_voltage <= 10.0) {
            eyre::bail!("device.nominal_voltage must be in (0.0, 10.0]");
        }

        // Smoother
        let s = &self.smoother;
        if !(s.ema_alpha > 0.0 && s.ema_alpha <= 1.0) {
            eyre::bail!("smoother.ema_alpha must be in (0.0, 1.0]");
        }
        if s.warmup_watts <= 0.0 {
            eyre::bail!("smoother.warmup_watts must be > 0.0");
        }
        if s.min_rate_pct_per_min <= 0.0 {
            eyre::bail!("smoother.min_rate_pct_per_min must be > 0.0");
        }
        if s.max_rate_pct_per_min <= s.min_rate_pct_per_min {
            eyre::bail!("smoother.max_rate_pct_per_min must exceed min_rate_pct_per_min");
        }
        if s.expected_tick_secs == 0 {
            eyre::bail!("smoother.expected_tick_secs must be >= 1");
        }
        if s.data_gap_factor < 1.0 {
            eyre::bail!("smoother.data_gap_factor must be >= 1.0");
        }
        if s.warmup_secs > 60 * 60 {
            eyre::bail!("smoother.warmup_secs is unreasonably large (>1h)");
        }

        // Detector
        let d = &self.detector;
        if d.optimized_low_pct < 0
            || d.optimized_high_pct > 100
            || d.optimized_low_pct > d.optimized_high_pct
        {
            eyre::bail!("detector optimized band must satisfy 0 <= low <= high <= 100");
        }
        if d.trickle_watts < 0.0 {
            eyre::bail!("detector.trickle_watts must be >= 0.0");
        }
        if d.spike_ratio <= 1.0 {
            eyre::bail!("detector.spike_ratio must be > 1.0");
        }
        if d.enter_ticks_thermal == 0
            || d.enter_ticks_optimized == 0
            || d.enter_ticks_spike == 0
            || d.exit_ticks == 0
        {
            eyre::bail!("detector hysteresis tick counts must be >= 1");
        }

        // Presenter
        let p = &self.presenter;
        if p.big_ratio <= 1.0 {
            eyre::bail!("presenter.big_ratio must be > 1.0");
        }
        if p.confirm_count == 0 {
            eyre::bail!("presenter.confirm_count must be >= 1");
        }
        if !(0.0..=1.0).contains(&p.rise_ratio) || !(0.0..=1.0).contains(&p.fall_ratio) {
            eyre::bail!("presenter rise_ratio/fall_ratio must be in [0.0, 1.0]");
        }
        if p.min_interval_ms > 60_000 {
            eyre::bail!("presenter.min_interval_ms is unreasonably large (>60s)");
        }

        // Persistence
        if self.persistence.retention_days == 0 {
            eyre::bail!("persistence.retention_days must be >= 1");
        }
        if self.persistence.notify_coalesce_ms == 0 {
            eyre::bail!("persistence.notify_coalesce_ms must be >= 1");
        }

        // Session
        if self.session.unplug_confirm_ms > 10_000 {
            eyre::bail!("session.unplug_confirm_ms is unreasonably large (>10s)");
        }

        Ok(())
    }
}
