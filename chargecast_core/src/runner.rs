//! Driving loops for `ChargeEngine`.
//!
//! - `replay` feeds a recorded trace through the engine on a manual clock,
//!   so results depend only on the trace.
//! - `run_live` consumes a `Sampler` until the shutdown flag is raised,
//!   waking on samples, unplug tickets, or a poll interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chargecast_config::TraceRow;
use chargecast_traits::{Clock, ManualClock, RawSample};
use crossbeam_channel as xch;
use serde::Serialize;

use crate::engine::{ChargeEngine, TickReport};
use crate::error::{ChargeError, Result};
use crate::sampler::Sampler;

/// One replayed trace row and what the engine made of it.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayStep {
    pub ts: f64,
    pub soc: i32,
    pub charging: bool,
    pub pause_reason: Option<&'static str>,
    #[serde(flatten)]
    pub report: TickReport,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub rejected: u64,
    pub sessions_ended: u64,
}

fn tick_or_count(engine: &mut ChargeEngine, sample: RawSample, summary: &mut RunSummary) -> Result<Option<TickReport>> {
    match engine.tick(sample) {
        Ok(report) => {
            summary.ticks += 1;
            Ok(Some(report))
        }
        Err(e) if matches!(e.downcast_ref::<ChargeError>(), Some(ChargeError::Rejected(_))) => {
            summary.rejected += 1;
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Replay `rows` through `engine`, whose clock must be `clock`.
///
/// The clock's wall origin should equal the first row's `ts`. After the
/// last row the clock is advanced past the unplug delay so a trailing unplug
/// is confirmed.
pub fn replay(
    engine: &mut ChargeEngine,
    rows: &[TraceRow],
    clock: &ManualClock,
    mut on_step: impl FnMut(&ReplayStep),
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    let Some(first) = rows.first() else {
        return Ok(summary);
    };
    tracing::info!(rows = rows.len(), start = first.ts, "replay start");

    for row in rows {
        let offset = (row.ts - first.ts).max(0.0);
        clock.set_offset(Duration::from_secs_f64(offset));
        let sample = RawSample::new(clock.now(), row.soc, row.charging).with_thermal(row.thermal);
        if let Some(report) = tick_or_count(engine, sample, &mut summary)? {
            let step = ReplayStep {
                ts: row.ts,
                soc: row.soc,
                charging: row.charging,
                pause_reason: report.pause_reason(),
                report,
            };
            on_step(&step);
        }
    }

    clock.advance(engine.session_cfg().unplug_confirm);
    engine.settle_pending(clock.now());
    summary.sessions_ended = engine.sessions_ended();
    tracing::info!(
        ticks = summary.ticks,
        rejected = summary.rejected,
        sessions = summary.sessions_ended,
        "replay complete"
    );
    Ok(summary)
}

/// Options for [`run_live`].
#[derive(Debug, Clone, Copy)]
pub struct LiveOptions {
    /// Upper bound on how long the loop waits without a sample.
    pub poll: Duration,
    /// Stop after this many ticks (for tests and one-shot runs).
    pub max_ticks: Option<u64>,
}

impl Default for LiveOptions {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(250),
            max_ticks: None,
        }
    }
}

/// Drive `engine` from `sampler` until `shutdown` is set or `max_ticks` is hit.
pub fn run_live<C: Clock>(
    engine: &mut ChargeEngine,
    sampler: &Sampler,
    clock: &C,
    shutdown: &AtomicBool,
    opts: LiveOptions,
    mut on_tick: impl FnMut(&TickReport),
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    let tickets = engine.unplug_tickets();
    let samples = sampler.receiver().clone();
    tracing::info!(poll_ms = opts.poll.as_millis() as u64, "live loop start");

    while !shutdown.load(Ordering::Relaxed) {
        if opts.max_ticks.is_some_and(|max| summary.ticks >= max) {
            break;
        }
        xch::select! {
            recv(samples) -> msg => match msg {
                Ok(sample) => {
                    if let Some(report) = tick_or_count(engine, sample, &mut summary)? {
                        on_tick(&report);
                    }
                }
                Err(_) => {
                    tracing::warn!("sampler channel closed; stopping");
                    break;
                }
            },
            recv(tickets) -> msg => {
                if let Ok(ticket) = msg {
                    engine.confirm_unplug(ticket, clock.now());
                }
            },
            default(opts.poll) => {
                engine.settle_pending(clock.now());
            },
        }
    }

    summary.sessions_ended = engine.sessions_ended();
    tracing::info!(
        ticks = summary.ticks,
        rejected = summary.rejected,
        sessions = summary.sessions_ended,
        "live loop stopped"
    );
    Ok(summary)
}
