//! Delayed unplug confirmation gated by a generation counter.
//!
//! An observed unplug arms the gate; the session only ends once the delay
//! has passed and the armed generation is still current. A replug inside the
//! delay bumps the generation, so any ticket already in flight is ignored.
//!
//! Deadlines are checked against the caller's `Instant`, which keeps replay
//! and tests deterministic. An optional timer thread additionally posts a
//! ticket when the delay expires so a live loop can wake without a sample.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chargecast_traits::Clock;
use crossbeam_channel as xch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnplugTicket {
    pub generation: u64,
}

pub struct UnplugGate {
    delay: Duration,
    generation: Arc<AtomicU64>,
    pending: Option<(u64, Instant)>,
    timer: Option<Arc<dyn Clock + Send + Sync>>,
    tx: xch::Sender<UnplugTicket>,
    rx: xch::Receiver<UnplugTicket>,
}

impl core::fmt::Debug for UnplugGate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UnplugGate")
            .field("delay", &self.delay)
            .field("generation", &self.generation())
            .field("pending", &self.pending)
            .field("timer_thread", &self.timer.is_some())
            .finish()
    }
}

impl UnplugGate {
    pub fn new(delay: Duration) -> Self {
        let (tx, rx) = xch::unbounded();
        Self {
            delay,
            generation: Arc::new(AtomicU64::new(0)),
            pending: None,
            timer: None,
            tx,
            rx,
        }
    }

    /// Also post tickets from a timer thread sleeping on `clock`.
    pub fn with_timer_thread(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.timer = Some(clock);
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Receiver for timer-thread tickets (empty when no timer thread is used).
    pub fn tickets(&self) -> xch::Receiver<UnplugTicket> {
        self.rx.clone()
    }

    /// Arm a confirmation due at `now + delay`. Re-arming supersedes.
    pub fn arm(&mut self, now: Instant) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.pending = Some((generation, now + self.delay));
        tracing::debug!(generation, delay_ms = self.delay.as_millis() as u64, "unplug confirmation armed");

        if let Some(clock) = &self.timer {
            let clock = Arc::clone(clock);
            let current = Arc::clone(&self.generation);
            let tx = self.tx.clone();
            let delay = self.delay;
            std::thread::spawn(move || {
                clock.sleep(delay);
                if current.load(Ordering::Acquire) == generation {
                    let _ = tx.send(UnplugTicket { generation });
                }
            });
        }
        generation
    }

    /// Cancel a pending confirmation. Returns true if one was pending.
    pub fn invalidate(&mut self) -> bool {
        match self.pending.take() {
            Some((generation, _)) => {
                self.generation.fetch_add(1, Ordering::AcqRel);
                tracing::debug!(generation, "unplug confirmation invalidated");
                true
            }
            None => false,
        }
    }

    pub fn is_current(&self, ticket: UnplugTicket) -> bool {
        self.pending.is_some_and(|(g, _)| g == ticket.generation)
            && self.generation() == ticket.generation
    }

    /// Ticket for a pending confirmation whose deadline has passed, or that
    /// the timer thread already posted.
    pub fn due(&self, now: Instant) -> Option<UnplugTicket> {
        let mut posted = None;
        for t in self.rx.try_iter() {
            if self.is_current(t) {
                posted = Some(t);
            }
        }
        if posted.is_some() {
            return posted;
        }
        let (generation, deadline) = self.pending?;
        (now >= deadline).then_some(UnplugTicket { generation })
    }

    /// Consume a ticket. Returns false for stale tickets.
    pub fn confirm(&mut self, ticket: UnplugTicket) -> bool {
        if !self.is_current(ticket) {
            tracing::trace!(generation = ticket.generation, "stale unplug ticket ignored");
            return false;
        }
        self.pending = None;
        true
    }
}
