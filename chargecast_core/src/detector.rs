//! Pause/anomaly detector.
//!
//! Classifies each charging tick as thermal throttling, an optimized-charging
//! plateau, an ETA spike, or a stale low-power step, and latches a pause only
//! after enough consecutive qualifying ticks. While a pause is pending or
//! active the output is frozen at the last stable ETA/watts.

use std::time::Instant;

use chargecast_traits::ThermalState;
use serde::Serialize;

use crate::config::DetectorCfg;
use crate::util::whole_secs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    Thermal,
    Optimized,
    Spike,
    /// Stale step at trickle power with no better explanation.
    Unknown,
}

impl PauseReason {
    /// Stable reason code for logs.
    pub fn code(self) -> &'static str {
        match self {
            PauseReason::Thermal => "thermal",
            PauseReason::Optimized => "optimized",
            PauseReason::Spike => "spike",
            PauseReason::Unknown => "stale_step_low_watts",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PauseStatus {
    pub is_paused: bool,
    pub reason: Option<PauseReason>,
    pub since: Option<Instant>,
    pub elapsed_secs: u32,
}

/// Inputs to one detector evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorInput {
    pub is_charging: bool,
    pub system_percent: i32,
    pub in_warmup: bool,
    pub smoothed_eta: Option<u32>,
    pub smoothed_watts: f64,
    pub thermal: ThermalState,
    pub data_gap: bool,
    pub stale_step: bool,
}

/// ETA/watts the detector lets through to presentation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DisplayEta {
    pub eta: Option<u32>,
    pub watts: f64,
}

#[derive(Debug)]
pub struct PauseDetector {
    cfg: DetectorCfg,
    paused: Option<(PauseReason, Instant)>,
    qualify_count: u8,
    clear_count: u8,
    last_soc: Option<i32>,
    soc_changed_at: Option<Instant>,
    baseline_eta: Option<u32>,
    stable: DisplayEta,
}

impl PauseDetector {
    pub fn new(cfg: DetectorCfg) -> Self {
        Self {
            cfg,
            paused: None,
            qualify_count: 0,
            clear_count: 0,
            last_soc: None,
            soc_changed_at: None,
            baseline_eta: None,
            stable: DisplayEta::default(),
        }
    }

    /// Drop hysteresis state and any active pause.
    pub fn reset(&mut self) {
        if let Some((reason, _)) = self.paused.take() {
            tracing::debug!(reason = reason.code(), "pause cleared by reset");
        }
        self.qualify_count = 0;
        self.clear_count = 0;
        self.baseline_eta = None;
        self.last_soc = None;
        self.soc_changed_at = None;
    }

    pub fn is_paused(&self) -> bool {
        self.paused.is_some()
    }

    pub fn evaluate(&mut self, input: DetectorInput, now: Instant) -> (PauseStatus, DisplayEta) {
        let live = DisplayEta {
            eta: input.smoothed_eta,
            watts: input.smoothed_watts,
        };

        if !input.is_charging {
            self.reset();
            self.stable = live;
            return (PauseStatus::default(), live);
        }

        if self.last_soc != Some(input.system_percent) {
            self.last_soc = Some(input.system_percent);
            self.soc_changed_at = Some(now);
        }

        if input.in_warmup {
            if self.paused.is_some() || self.qualify_count > 0 {
                tracing::debug!("warmup bypasses pause detection");
            }
            self.paused = None;
            self.qualify_count = 0;
            self.clear_count = 0;
            self.baseline_eta = input.smoothed_eta;
            self.stable = live;
            return (PauseStatus::default(), live);
        }

        if input.data_gap {
            tracing::debug!(
                reason = "data_gap",
                soc = input.system_percent,
                "freezing estimate until a timely sample arrives"
            );
            return (self.status(now), self.stable);
        }

        let candidate = self.classify(&input, now);
        if candidate.is_none_or(|r| r != PauseReason::Spike && r != PauseReason::Optimized) {
            self.baseline_eta = input.smoothed_eta;
        }

        match self.paused {
            None => match candidate {
                Some(reason) => {
                    self.qualify_count = self.qualify_count.saturating_add(1);
                    if self.qualify_count >= self.enter_ticks(reason) {
                        self.paused = Some((reason, now));
                        self.clear_count = 0;
                        tracing::info!(
                            reason = reason.code(),
                            soc = input.system_percent,
                            watts = input.smoothed_watts,
                            ticks = self.qualify_count,
                            "charging pause detected"
                        );
                    } else {
                        tracing::debug!(
                            reason = reason.code(),
                            ticks = self.qualify_count,
                            "pause candidate"
                        );
                    }
                }
                None => {
                    self.qualify_count = 0;
                    self.stable = live;
                }
            },
            Some((reason, since)) => match candidate {
                Some(next) => {
                    self.clear_count = 0;
                    if next == PauseReason::Thermal && reason != PauseReason::Thermal {
                        self.paused = Some((next, since));
                    }
                }
                None => {
                    self.clear_count = self.clear_count.saturating_add(1);
                    if self.clear_count >= self.cfg.exit_ticks.max(1) {
                        tracing::info!(
                            reason = reason.code(),
                            paused_secs = whole_secs(now.saturating_duration_since(since)),
                            "charging pause cleared"
                        );
                        self.paused = None;
                        self.qualify_count = 0;
                        self.clear_count = 0;
                        self.stable = live;
                    }
                }
            },
        }

        (self.status(now), self.stable)
    }

    fn classify(&self, input: &DetectorInput, now: Instant) -> Option<PauseReason> {
        if input.thermal.is_elevated() {
            return Some(PauseReason::Thermal);
        }

        let (lo, hi) = self.cfg.optimized_band;
        let in_band = (lo..=hi).contains(&input.system_percent);
        let trickle = input.smoothed_watts <= self.cfg.trickle_watts;
        let dwelled = self
            .soc_changed_at
            .is_some_and(|t| now.saturating_duration_since(t) >= self.cfg.optimized_dwell);
        if in_band && dwelled && trickle {
            return Some(PauseReason::Optimized);
        }

        if let Some(eta) = input.smoothed_eta {
            let over_ceiling = eta >= self.cfg.spike_ceiling_min;
            let jumped = self
                .baseline_eta
                .is_some_and(|prev| prev > 0 && f64::from(eta) >= self.cfg.spike_ratio * f64::from(prev));
            if over_ceiling || jumped {
                return Some(if in_band {
                    PauseReason::Optimized
                } else {
                    PauseReason::Spike
                });
            }
        }

        if input.stale_step && trickle {
            return Some(PauseReason::Unknown);
        }
        None
    }

    fn enter_ticks(&self, reason: PauseReason) -> u8 {
        let n = match reason {
            PauseReason::Thermal => self.cfg.enter_ticks_thermal,
            PauseReason::Optimized | PauseReason::Unknown => self.cfg.enter_ticks_optimized,
            PauseReason::Spike => self.cfg.enter_ticks_spike,
        };
        n.max(1)
    }

    fn status(&self, now: Instant) -> PauseStatus {
        match self.paused {
            Some((reason, since)) => PauseStatus {
                is_paused: true,
                reason: Some(reason),
                since: Some(since),
                elapsed_secs: whole_secs(now.saturating_duration_since(since)),
            },
            None => PauseStatus::default(),
        }
    }
}
