//! Coalesced fan-out of change events to channel subscribers.
//!
//! A `Coalescer` fires at most once per window. Events published inside the
//! window are held (latest wins) and released by `poll` once the window has
//! elapsed, so a burst of writes produces one leading and one trailing event.

use std::time::{Duration, Instant};

use crossbeam_channel as xch;

#[derive(Debug)]
pub struct Coalescer<E: Clone> {
    window: Duration,
    last_fired: Option<Instant>,
    pending: Option<E>,
    subscribers: Vec<xch::Sender<E>>,
}

impl<E: Clone> Coalescer<E> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fired: None,
            pending: None,
            subscribers: Vec::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Register a new subscriber. Dropping the receiver unsubscribes.
    pub fn subscribe(&mut self) -> xch::Receiver<E> {
        let (tx, rx) = xch::unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Publish an event; returns true if it was delivered immediately.
    pub fn publish(&mut self, event: E, now: Instant) -> bool {
        if self.window_open(now) {
            self.fire(event, now);
            true
        } else {
            self.pending = Some(event);
            false
        }
    }

    /// Deliver a held event once the window allows; returns true if fired.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.pending.is_some() && self.window_open(now) {
            if let Some(event) = self.pending.take() {
                self.fire(event, now);
            }
            return true;
        }
        false
    }

    /// Time until a held event becomes deliverable, if one is held.
    pub fn next_due(&self, now: Instant) -> Option<Duration> {
        self.pending.as_ref()?;
        let due = self
            .last_fired
            .map(|t| (t + self.window).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO);
        Some(due)
    }

    #[inline]
    fn window_open(&self, now: Instant) -> bool {
        self.last_fired
            .is_none_or(|t| now.saturating_duration_since(t) >= self.window)
    }

    fn fire(&mut self, event: E, now: Instant) {
        self.last_fired = Some(now);
        self.pending = None;
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
