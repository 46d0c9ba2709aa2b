//! Command implementations: config loading, engine assembly and output.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use chargecast_config::Config;
use chargecast_core::runner::{self, LiveOptions, ReplayStep, RunSummary};
use chargecast_core::sampler::Sampler;
use chargecast_core::util::format_eta;
use chargecast_core::{ChargeEngine, ChargeState, TickReport};
use chargecast_device::{POWER_SUPPLY_ROOT, SimulatedBattery, SysfsBattery};
use chargecast_store::{SeriesWorker, TimeSeriesStore};
use chargecast_traits::{BatteryMonitor, Clock, ManualClock, MonotonicClock, RawSample};
use eyre::{Result, WrapErr};

use crate::cli::Source;
use crate::error_fmt::{CONFIG_CONTEXT, TRACE_CONTEXT};

/// Longest wait between sysfs probes, so plug changes show up quickly.
const SYSFS_PROBE: Duration = Duration::from_secs(5);

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))
        .wrap_err(CONFIG_CONTEXT)?;
    let cfg = chargecast_config::load_toml(&text).wrap_err(CONFIG_CONTEXT)?;
    cfg.validate().wrap_err(CONFIG_CONTEXT)?;
    Ok(cfg)
}

fn db_path(flag: Option<PathBuf>, cfg: &Config) -> Option<PathBuf> {
    flag.or_else(|| cfg.persistence.path.as_ref().map(PathBuf::from))
}

fn notify_window(cfg: &Config) -> Duration {
    Duration::from_millis(cfg.persistence.notify_coalesce_ms)
}

fn open_worker(path: &Path, cfg: &Config) -> Result<SeriesWorker> {
    let store = TimeSeriesStore::open(path, notify_window(cfg))?;
    Ok(SeriesWorker::spawn(store)?)
}

fn require_db(flag: Option<PathBuf>, cfg: &Config) -> Result<TimeSeriesStore> {
    let Some(path) = db_path(flag, cfg) else {
        eyre::bail!("no database: pass --db or set persistence.path");
    };
    Ok(TimeSeriesStore::open(path, notify_window(cfg))?)
}

fn fmt_opt(v: Option<f64>, unit: &str) -> String {
    v.map_or_else(|| "--".to_string(), |x| format!("{x:.1}{unit}"))
}

fn write_report(out: &mut impl Write, ts: f64, report: &TickReport, pause: Option<&str>) -> std::io::Result<()> {
    let snap = &report.snapshot;
    writeln!(
        out,
        "{ts:.0}  {soc:>3}%  {state:<9} eta {eta:<8} {watts:>7} {rate:>9}{pause}",
        soc = snap.soc_percent(),
        state = snap.state().as_str(),
        eta = format_eta(snap.eta_minutes()),
        watts = fmt_opt(snap.watts(), " W"),
        rate = fmt_opt(snap.rate_pct_per_min(), " %/m"),
        pause = pause.map(|p| format!("  paused:{p}")).unwrap_or_default(),
    )
}

fn write_step(out: &mut impl Write, step: &ReplayStep, json: bool) -> Result<()> {
    if json {
        writeln!(out, "{}", serde_json::to_string(step)?)?;
    } else {
        write_report(out, step.ts, &step.report, step.pause_reason)?;
    }
    Ok(())
}

fn write_summary(out: &mut impl Write, summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        writeln!(out, "{}", serde_json::json!({ "summary": summary }))?;
    } else {
        writeln!(
            out,
            "{} ticks ({} rejected), {} sessions ended",
            summary.ticks, summary.rejected, summary.sessions_ended
        )?;
    }
    Ok(())
}

pub fn run_replay(cfg: &Config, trace: &Path, db: Option<PathBuf>, json: bool) -> Result<()> {
    let rows = chargecast_config::load_trace_csv(trace).wrap_err(TRACE_CONTEXT)?;
    let Some(first) = rows.first() else {
        return Err(eyre::eyre!("trace has no samples")).wrap_err(TRACE_CONTEXT);
    };
    let clock = ManualClock::starting_at(first.ts);
    let worker = db_path(db, cfg).map(|p| open_worker(&p, cfg)).transpose()?;

    let mut builder = ChargeEngine::builder()
        .with_config(cfg)
        .with_clock(Arc::new(clock.clone()));
    if let Some(w) = &worker {
        builder = builder.with_writer(w.clone());
    }
    let mut engine = builder.build()?;

    let mut out = std::io::stdout().lock();
    let mut write_err: Option<eyre::Report> = None;
    let summary = runner::replay(&mut engine, &rows, &clock, |step| {
        if write_err.is_none()
            && let Err(e) = write_step(&mut out, step, json)
        {
            write_err = Some(e);
        }
    })?;
    if let Some(e) = write_err {
        return Err(e);
    }
    if let Some(w) = &worker {
        w.sync()?;
    }
    write_summary(&mut out, &summary, json)
}

/// Options for the `watch` command.
#[derive(Debug, Clone)]
pub struct WatchArgs {
    pub source: Source,
    pub sysfs_dir: Option<PathBuf>,
    pub sim_soc: i32,
    pub sim_watts: f64,
    pub interval_ms: Option<u64>,
    pub max_ticks: Option<u64>,
    pub db: Option<PathBuf>,
}

fn sysfs_battery(dir: Option<PathBuf>) -> Result<SysfsBattery> {
    Ok(match dir {
        Some(d) => SysfsBattery::new(d),
        None => SysfsBattery::discover(POWER_SUPPLY_ROOT)?,
    })
}

fn spawn_sampler(cfg: &Config, args: &WatchArgs, interval: Duration) -> Result<Sampler> {
    let sampler = match args.source {
        Source::Sim => {
            let battery = SimulatedBattery::new(args.sim_soc)
                .with_profile(cfg.device.capacity_mah, f64::from(cfg.device.nominal_voltage))
                .with_charger_watts(args.sim_watts);
            Sampler::spawn(battery, interval, MonotonicClock::new())
        }
        Source::Sysfs => {
            let battery = sysfs_battery(args.sysfs_dir.clone())?;
            // Fail fast on an unreadable supply instead of looping on errors.
            battery.sample(Instant::now())?;
            Sampler::spawn_on_change(battery, interval.min(SYSFS_PROBE), interval, MonotonicClock::new())
        }
    };
    Ok(sampler)
}

#[derive(PartialEq)]
struct Shown {
    soc: i32,
    state: ChargeState,
    eta: String,
}

pub fn run_watch(cfg: &Config, args: WatchArgs, json: bool, shutdown: &AtomicBool) -> Result<()> {
    let clock = MonotonicClock::new();
    let worker = db_path(args.db.clone(), cfg)
        .map(|p| open_worker(&p, cfg))
        .transpose()?;
    if let Some(w) = &worker {
        let removed = w.trim(cfg.persistence.retention_days, clock.unix_secs())?;
        tracing::info!(removed, "retention trim at startup");
    }

    let mut builder = ChargeEngine::builder()
        .with_config(cfg)
        .with_clock(Arc::new(MonotonicClock::new()))
        .with_unplug_timer_thread(true);
    if let Some(w) = &worker {
        builder = builder.with_writer(w.clone());
    }
    let mut engine = builder.build()?;

    let interval = args
        .interval_ms
        .map_or_else(|| Duration::from_secs(cfg.smoother.expected_tick_secs), Duration::from_millis);
    let sampler = spawn_sampler(cfg, &args, interval)?;
    tracing::info!(source = ?args.source, interval_ms = interval.as_millis() as u64, "watching");

    let mut out = std::io::stdout().lock();
    let mut last: Option<Shown> = None;
    let mut write_err: Option<eyre::Report> = None;
    let opts = LiveOptions {
        max_ticks: args.max_ticks,
        ..LiveOptions::default()
    };
    let summary = runner::run_live(&mut engine, &sampler, &clock, shutdown, opts, |report| {
        let shown = Shown {
            soc: report.snapshot.soc_percent(),
            state: report.snapshot.state(),
            eta: format_eta(report.snapshot.eta_minutes()),
        };
        if last.as_ref() == Some(&shown) || write_err.is_some() {
            return;
        }
        last = Some(shown);
        let res = if json {
            serde_json::to_string(report)
                .map_err(eyre::Report::from)
                .and_then(|s| writeln!(out, "{s}").map_err(eyre::Report::from))
        } else {
            write_report(&mut out, report.snapshot.timestamp(), report, report.pause_reason())
                .map_err(eyre::Report::from)
        };
        if let Err(e) = res {
            write_err = Some(e);
        }
    })?;
    if let Some(e) = write_err {
        return Err(e);
    }
    if sampler.error_count() > 0 {
        tracing::warn!(errors = sampler.error_count(), "battery reads failed during watch");
    }
    if let Some(w) = &worker {
        w.sync()?;
    }
    write_summary(&mut out, &summary, json)
}

pub fn run_history(cfg: &Config, db: Option<PathBuf>, from: f64, to: f64, json: bool) -> Result<()> {
    let store = require_db(db, cfg)?;
    let rows = store.range(from, to)?;
    let mut out = std::io::stdout().lock();
    for row in &rows {
        if json {
            writeln!(out, "{}", serde_json::to_string(row)?)?;
        } else {
            writeln!(
                out,
                "{ts:.0}  {session}  {event:<13} {src:<8} {soc:>3}%  {charging:<5} {watts:>7}  eta {eta}",
                ts = row.ts,
                session = row.session_id,
                event = row.event.as_str(),
                src = row.source.as_str(),
                soc = row.soc,
                charging = row.is_charging,
                watts = fmt_opt(row.watts, " W"),
                eta = format_eta(row.eta_minutes),
            )?;
        }
    }
    if !json {
        writeln!(out, "{} rows", rows.len())?;
    }
    Ok(())
}

pub fn run_trim(cfg: &Config, db: Option<PathBuf>, days: Option<u32>, json: bool) -> Result<()> {
    let days = days.unwrap_or(cfg.persistence.retention_days);
    if days == 0 {
        eyre::bail!("--days must be >= 1");
    }
    let mut store = require_db(db, cfg)?;
    let removed = store.trim(days, MonotonicClock::new().unix_secs())?;
    let mut out = std::io::stdout().lock();
    if json {
        writeln!(out, "{}", serde_json::json!({ "removed": removed, "older_than_days": days }))?;
    } else {
        writeln!(out, "removed {removed} rows older than {days} days")?;
    }
    Ok(())
}

/// Build an engine from the config, push one simulated sample through it with
/// an in-memory store attached, and probe for a sysfs battery.
pub fn self_check(cfg: &Config, json: bool) -> Result<()> {
    let clock = ManualClock::new();
    let store = TimeSeriesStore::open_in_memory(notify_window(cfg))?;
    let worker = SeriesWorker::spawn(store)?;
    let mut engine = ChargeEngine::builder()
        .with_config(cfg)
        .with_clock(Arc::new(clock.clone()))
        .with_writer(worker.clone())
        .build()?;

    let mut sim = SimulatedBattery::new(50);
    let sample: RawSample = sim
        .read(clock.now())
        .map_err(|e| eyre::eyre!("simulated battery: {e}"))?;
    let report = engine.tick(sample)?;
    worker.sync()?;
    let rows = worker.count()?;
    if rows == 0 {
        eyre::bail!("self-check: engine wrote no rows");
    }

    let battery = SysfsBattery::discover(POWER_SUPPLY_ROOT).ok();
    let mut out = std::io::stdout().lock();
    if json {
        writeln!(
            out,
            "{}",
            serde_json::json!({
                "status": "ok",
                "state": report.snapshot.state().as_str(),
                "rows": rows,
                "sysfs": battery.as_ref().map(|b| b.dir().display().to_string()),
            })
        )?;
    } else {
        writeln!(out, "engine ok (state {}, {rows} rows)", report.snapshot.state().as_str())?;
        match battery {
            Some(b) => writeln!(out, "battery: {}", b.dir().display())?,
            None => writeln!(out, "battery: none found (use --source sim)")?,
        }
        writeln!(out, "OK")?;
    }
    Ok(())
}
