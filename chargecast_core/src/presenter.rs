//! ETA presenter: the last gate before a value becomes user-visible.
//!
//! Applied in order: tick-token idempotency, duplicate-input suppression,
//! rate limiting, warmup bypass, spike quarantine, slew limiting. When not
//! charging the raw value passes straight through, ahead of dedup and the
//! rate limit, and becomes the anchor for the next session.

use std::time::Instant;

use serde::Serialize;

use crate::config::PresenterCfg;
use crate::util::format_eta;

/// Identifies one logical tick; repeated calls with the same token are free.
pub type TickToken = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresentedOutput {
    pub minutes_to_full: Option<u32>,
    pub formatted_text: String,
}

impl PresentedOutput {
    fn from_minutes(minutes: Option<u32>) -> Self {
        Self {
            minutes_to_full: minutes,
            formatted_text: format_eta(minutes),
        }
    }
}

impl Default for PresentedOutput {
    fn default() -> Self {
        Self::from_minutes(None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresenterInput {
    pub raw_eta: Option<u32>,
    pub watts: f64,
    pub sys_pct: i32,
    pub is_charging: bool,
    pub is_warmup: bool,
    pub tick: TickToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenterState {
    Uninitialized,
    WarmupSeeding,
    StableTracking,
    SpikeQuarantine,
}

type InputKey = (Option<u32>, i32, i64, bool);

#[derive(Debug)]
pub struct EtaPresenter {
    cfg: PresenterCfg,
    state: PresenterState,
    last_tick: Option<TickToken>,
    last_key: Option<InputKey>,
    last_advance: Option<Instant>,
    last_stable: Option<u32>,
    pending: Option<(u32, u8)>,
    accepted_spike: Option<u32>,
    output: PresentedOutput,
}

impl EtaPresenter {
    pub fn new(cfg: PresenterCfg) -> Self {
        Self {
            cfg,
            state: PresenterState::Uninitialized,
            last_tick: None,
            last_key: None,
            last_advance: None,
            last_stable: None,
            pending: None,
            accepted_spike: None,
            output: PresentedOutput::default(),
        }
    }

    pub fn state(&self) -> PresenterState {
        self.state
    }

    pub fn last_stable(&self) -> Option<u32> {
        self.last_stable
    }

    /// Clear all quarantine and idempotency state. The last stable anchor
    /// survives so the next session can start from it.
    pub fn reset_session(&mut self) {
        self.state = PresenterState::Uninitialized;
        self.last_tick = None;
        self.last_key = None;
        self.last_advance = None;
        self.pending = None;
        self.accepted_spike = None;
    }

    /// Like [`reset_session`](Self::reset_session) but also forgets the anchor
    /// and the current output.
    pub fn reset_for_new_session(&mut self) {
        self.reset_session();
        self.last_stable = None;
        self.output = PresentedOutput::default();
    }

    pub fn presented(&mut self, input: PresenterInput, now: Instant) -> PresentedOutput {
        if self.last_tick == Some(input.tick) {
            return self.output.clone();
        }
        self.last_tick = Some(input.tick);

        let key: InputKey = (
            input.raw_eta,
            input.sys_pct,
            (input.watts * 2.0).round() as i64,
            input.is_charging,
        );
        if !input.is_charging {
            self.last_key = Some(key);
            self.last_advance = Some(now);
            self.pending = None;
            self.accepted_spike = None;
            self.last_stable = input.raw_eta;
            self.output = PresentedOutput::from_minutes(input.raw_eta);
            return self.output.clone();
        }

        // A repeated input may only reuse the output once the slew has landed.
        let quarantined = self.pending.is_some();
        let settled = self.output.minutes_to_full == input.raw_eta;
        if !quarantined && settled && self.last_key == Some(key) {
            return self.output.clone();
        }
        if !quarantined
            && let Some(t) = self.last_advance
            && now.saturating_duration_since(t) < self.cfg.min_interval
        {
            tracing::trace!("presenter update coalesced by rate limit");
            return self.output.clone();
        }
        self.last_key = Some(key);
        self.last_advance = Some(now);

        let minutes = if input.is_warmup {
            self.state = PresenterState::WarmupSeeding;
            self.pending = None;
            self.accepted_spike = None;
            self.last_stable = input.raw_eta;
            input.raw_eta
        } else {
            self.track(input.raw_eta, input.watts)
        };

        self.output = PresentedOutput::from_minutes(minutes);
        self.output.clone()
    }

    fn track(&mut self, raw: Option<u32>, watts: f64) -> Option<u32> {
        let Some(raw) = raw else {
            // Nothing to show yet; hold the anchor.
            return self.last_stable;
        };
        let Some(stable) = self.last_stable else {
            self.state = PresenterState::StableTracking;
            self.last_stable = Some(raw);
            return Some(raw);
        };

        let big = raw >= self.cfg.big_eta_min
            || f64::from(raw) >= self.cfg.big_ratio * f64::from(stable.max(1));
        let trickle = watts <= self.cfg.trickle_watts;

        if big && trickle && self.accepted_spike != Some(raw) {
            let seen = match self.pending {
                Some((cand, n)) if cand == raw => n.saturating_add(1),
                _ => 1,
            };
            if seen < self.cfg.confirm_count.max(1) {
                self.pending = Some((raw, seen));
                self.state = PresenterState::SpikeQuarantine;
                tracing::debug!(candidate = raw, stable, seen, "ETA candidate quarantined");
                return Some(stable);
            }
            tracing::debug!(candidate = raw, stable, "quarantined ETA confirmed");
            self.accepted_spike = Some(raw);
        } else if !big {
            self.accepted_spike = None;
        }
        self.pending = None;
        self.state = PresenterState::StableTracking;

        let next = self.slew(stable, raw);
        self.last_stable = Some(next);
        Some(next)
    }

    fn slew(&self, stable: u32, target: u32) -> u32 {
        let s = f64::from(stable);
        if target > stable {
            let cap = f64::from(self.cfg.rise_floor_min).max(self.cfg.rise_ratio * s);
            let cap = cap.floor() as u32;
            target.min(stable.saturating_add(cap))
        } else {
            let cap = f64::from(self.cfg.fall_floor_min).max(self.cfg.fall_ratio * s);
            let cap = cap.floor() as u32;
            target.max(stable.saturating_sub(cap))
        }
    }
}
