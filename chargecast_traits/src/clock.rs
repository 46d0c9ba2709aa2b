use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Clock abstraction shared by the estimator, the unplug timer and the store.
///
/// - now(): monotonic Instant used for all elapsed-time math
/// - unix_secs(): wall time in seconds since the UNIX epoch (persisted `ts`)
/// - sleep(): sleeps for the provided duration (implementations may simulate)
pub trait Clock {
    fn now(&self) -> Instant;
    fn unix_secs(&self) -> f64;
    fn sleep(&self, d: Duration);

    /// Milliseconds elapsed since `epoch`, saturating at 0 on underflow.
    fn ms_since(&self, epoch: Instant) -> u64 {
        let dur = self.now().saturating_duration_since(epoch);
        dur.as_millis() as u64
    }

    /// Project a monotonic instant onto wall time using the current offset
    /// between the two clocks.
    fn unix_at(&self, at: Instant) -> f64 {
        let now = self.now();
        let wall = self.unix_secs();
        if at >= now {
            wall + at.duration_since(now).as_secs_f64()
        } else {
            wall - now.duration_since(at).as_secs_f64()
        }
    }
}

/// Default, real-time clock backed by `Instant` and `SystemTime`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_secs(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

/// Deterministic clock whose time is advanced manually.
///
/// now() = origin + offset, unix_secs() = unix_origin + offset.
/// sleep(d) advances internal time by d without actually sleeping.
/// Used by tests and by trace replay, where time comes from the trace.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    unix_origin: f64,
    offset: Arc<Mutex<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(1_700_000_000.0)
    }

    /// Clock whose wall time starts at `unix_origin` seconds.
    pub fn starting_at(unix_origin: f64) -> Self {
        Self {
            origin: Instant::now(),
            unix_origin,
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// The instant corresponding to offset zero.
    pub fn origin(&self) -> Instant {
        self.origin
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, d: Duration) {
        if let Ok(mut off) = self.offset.lock() {
            *off = off.saturating_add(d);
        }
    }

    /// Set the absolute offset relative to origin. Never moves backwards.
    pub fn set_offset(&self, d: Duration) {
        if let Ok(mut off) = self.offset.lock()
            && d > *off
        {
            *off = d;
        }
    }

    fn offset(&self) -> Duration {
        self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset()
    }

    fn unix_secs(&self) -> f64 {
        self.unix_origin + self.offset().as_secs_f64()
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}
