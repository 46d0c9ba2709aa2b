//! Background battery sampling.
//!
//! Spawns a thread that owns the `BatteryMonitor`, pushes readings through a
//! bounded channel, and tracks the last-ok timestamp so a caller can tell a
//! silent observer from a quiet battery. Two variants are provided: a paced
//! poll that forwards every reading, and a change-driven poll that forwards a
//! reading only when it differs from the last one or the heartbeat elapsed.
//!
//! Each `Sampler` spawns exactly one thread, shut down and joined on drop.
use crossbeam_channel as xch;
use chargecast_traits::clock::Clock;
use chargecast_traits::{BatteryMonitor, RawSample};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::collab_error::{Collaborator, map_collab_error};

/// Queue depth between the sampler thread and the consumer.
const CHANNEL_DEPTH: usize = 16;
/// Longest uninterrupted sleep, so drop never waits a full poll period.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

fn sleep_until_shutdown<C: Clock>(clock: &C, total: Duration, shutdown: &AtomicBool) {
    let mut left = total;
    while !left.is_zero() && !shutdown.load(Ordering::Relaxed) {
        let step = left.min(SLEEP_SLICE);
        clock.sleep(step);
        left -= step;
    }
}

pub struct Sampler {
    rx: xch::Receiver<RawSample>,
    last_ok: Arc<AtomicU64>,
    errors: Arc<AtomicU64>,
    epoch: Instant,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl core::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Sampler")
            .field("queued", &self.rx.len())
            .field("errors", &self.error_count())
            .finish()
    }
}

fn same_reading(a: &RawSample, b: &RawSample) -> bool {
    a.soc_percent == b.soc_percent && a.is_charging == b.is_charging && a.thermal == b.thermal
}

impl Sampler {
    /// Poll every `period` and forward every reading.
    pub fn spawn<M, C>(monitor: M, period: Duration, clock: C) -> Self
    where
        M: BatteryMonitor + Send + 'static,
        C: Clock + Send + Sync + 'static,
    {
        Self::spawn_inner(monitor, period, None, clock, "paced")
    }

    /// Poll every `probe`; forward a reading when it changed or when
    /// `heartbeat` passed since the last forwarded one.
    pub fn spawn_on_change<M, C>(monitor: M, probe: Duration, heartbeat: Duration, clock: C) -> Self
    where
        M: BatteryMonitor + Send + 'static,
        C: Clock + Send + Sync + 'static,
    {
        Self::spawn_inner(monitor, probe, Some(heartbeat), clock, "on_change")
    }

    fn spawn_inner<M, C>(
        mut monitor: M,
        period: Duration,
        heartbeat: Option<Duration>,
        clock: C,
        mode: &'static str,
    ) -> Self
    where
        M: BatteryMonitor + Send + 'static,
        C: Clock + Send + Sync + 'static,
    {
        let (tx, rx) = xch::bounded(CHANNEL_DEPTH);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let last_ok = Arc::new(AtomicU64::new(0));
        let last_ok_clone = last_ok.clone();
        let errors = Arc::new(AtomicU64::new(0));
        let errors_clone = errors.clone();
        let epoch = clock.now();
        let period = period.max(Duration::from_millis(1));

        let join_handle = std::thread::spawn(move || {
            let mut last_sent: Option<RawSample> = None;
            tracing::debug!(mode, period_ms = period.as_millis() as u64, "sampler thread started");
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("sampler thread received shutdown signal");
                    break;
                }

                let now = clock.now();
                match monitor.read(now) {
                    Ok(sample) => {
                        last_ok_clone.store(clock.ms_since(epoch), Ordering::Relaxed);
                        let forward = match (heartbeat, last_sent.as_ref()) {
                            (None, _) | (_, None) => true,
                            (Some(hb), Some(prev)) => {
                                !same_reading(prev, &sample)
                                    || sample.at.saturating_duration_since(prev.at) >= hb
                            }
                        };
                        if forward {
                            match tx.send_timeout(sample, period) {
                                Ok(()) => last_sent = Some(sample),
                                Err(xch::SendTimeoutError::Timeout(_)) => {
                                    tracing::warn!("sampler queue full; reading dropped");
                                }
                                Err(xch::SendTimeoutError::Disconnected(_)) => {
                                    tracing::debug!("sampler consumer disconnected, exiting thread");
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        let n = errors_clone.fetch_add(1, Ordering::Relaxed) + 1;
                        let err = map_collab_error(Collaborator::Observer, e.as_ref());
                        tracing::warn!(error = %err, failures = n, "battery read failed");
                    }
                }

                sleep_until_shutdown(&clock, period, &shutdown_clone);
            }
            tracing::trace!("sampler thread exiting cleanly");
        });

        Self {
            rx,
            last_ok,
            errors,
            epoch,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Channel of forwarded readings, for `select!` in a driving loop.
    pub fn receiver(&self) -> &xch::Receiver<RawSample> {
        &self.rx
    }

    /// Drain and return queued readings in arrival order.
    pub fn drain(&self) -> Vec<RawSample> {
        self.rx.try_iter().collect()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<RawSample> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Total failed reads since spawn.
    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Milliseconds since the last successful read, measured on the sampler's epoch.
    pub fn stalled_for(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_ok.load(Ordering::Relaxed))
    }

    /// Convenience helper: stall using this sampler's epoch and the real clock.
    pub fn stalled_for_now(&self) -> u64 {
        let ms = Instant::now().saturating_duration_since(self.epoch).as_millis();
        self.stalled_for(ms.min(u128::from(u64::MAX)) as u64)
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // Unblock a sender waiting on a full queue.
        while self.rx.try_recv().is_ok() {}
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("sampler thread joined"),
                Err(e) => tracing::warn!(?e, "sampler thread panicked during shutdown"),
            }
        }
    }
}
