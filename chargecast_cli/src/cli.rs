//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "chargecast", version, about = "Charging power and time-to-full estimator")]
pub struct Cli {
    /// Path to config TOML; defaults apply when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Emit JSON lines instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides logging.level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Where `watch` reads the battery from.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Source {
    /// Built-in charging curve
    Sim,
    /// Linux power-supply class
    Sysfs,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Feed a recorded CSV trace (ts,soc,charging[,thermal]) through the estimator
    Replay {
        #[arg(long, value_name = "FILE")]
        trace: PathBuf,
        /// Persist the series to this SQLite file (overrides persistence.path)
        #[arg(long, value_name = "FILE")]
        db: Option<PathBuf>,
    },
    /// Poll a live or simulated battery and print estimates as they change
    Watch {
        #[arg(long, value_enum, default_value = "sim")]
        source: Source,
        /// Supply directory for --source sysfs; discovered when omitted
        #[arg(long, value_name = "DIR")]
        sysfs_dir: Option<PathBuf>,
        /// Starting SoC for the simulated battery
        #[arg(long, default_value_t = 40)]
        sim_soc: i32,
        /// Charger power for the simulated battery
        #[arg(long, default_value_t = 10.0)]
        sim_watts: f64,
        /// Poll interval in ms; defaults to smoother.expected_tick_secs
        #[arg(long, value_name = "MS")]
        interval_ms: Option<u64>,
        /// Stop after this many ticks
        #[arg(long, value_name = "N")]
        max_ticks: Option<u64>,
        /// Persist the series to this SQLite file (overrides persistence.path)
        #[arg(long, value_name = "FILE")]
        db: Option<PathBuf>,
    },
    /// Print stored rows with from <= ts <= to (UNIX seconds)
    History {
        #[arg(long, value_name = "FILE")]
        db: Option<PathBuf>,
        #[arg(long, default_value_t = 0.0)]
        from: f64,
        #[arg(long, default_value_t = f64::MAX)]
        to: f64,
    },
    /// Delete stored rows older than the retention window
    Trim {
        #[arg(long, value_name = "FILE")]
        db: Option<PathBuf>,
        /// Overrides persistence.retention_days
        #[arg(long, value_name = "DAYS")]
        days: Option<u32>,
    },
    /// Quick health check: config, engine, store and battery source
    SelfCheck,
}
