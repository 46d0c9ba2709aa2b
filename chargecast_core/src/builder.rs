//! Builder for `ChargeEngine`.
//!
//! Every stage has a default configuration, so `ChargeEngine::builder().build()`
//! yields a working engine on the real clock with persistence disabled.
//! Validation runs once, in `validate_and_build`.

use std::sync::Arc;

use chargecast_traits::clock::{Clock, MonotonicClock};

use crate::config::*;
use crate::detector::PauseDetector;
use crate::engine::ChargeEngine;
use crate::error::{BuildError, Result};
use crate::persist::SeriesWriter;
use crate::presenter::EtaPresenter;
use crate::profile::DeviceProfile;
use crate::smoother::Smoother;
use crate::snapshot::SnapshotStore;
use crate::unplug::UnplugGate;

impl ChargeEngine {
    /// Start building an engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

#[derive(Default)]
pub struct EngineBuilder {
    profile: Option<DeviceProfile>,
    smoother: Option<SmootherCfg>,
    detector: Option<DetectorCfg>,
    presenter: Option<PresenterCfg>,
    persist: Option<PersistCfg>,
    session: Option<SessionCfg>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    writer: Option<Box<dyn SeriesWriter>>,
    unplug_timer_thread: bool,
}

impl core::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("profile", &self.profile)
            .field("persisting", &self.writer.is_some())
            .field("unplug_timer_thread", &self.unplug_timer_thread)
            .finish_non_exhaustive()
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

/// Validate configuration and construct the engine.
#[allow(clippy::too_many_arguments)]
fn validate_and_build(
    profile: DeviceProfile,
    smoother: SmootherCfg,
    detector: DetectorCfg,
    presenter: PresenterCfg,
    persist: PersistCfg,
    session: SessionCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    writer: Option<Box<dyn SeriesWriter>>,
    unplug_timer_thread: bool,
) -> Result<ChargeEngine> {
    // ── Validation ───────────────────────────────────────────────────────────
    if !(smoother.ema_alpha > 0.0 && smoother.ema_alpha <= 1.0) {
        return Err(invalid("ema_alpha must be in (0.0, 1.0]"));
    }
    if !(smoother.min_rate > 0.0 && smoother.min_rate <= smoother.max_rate) {
        return Err(invalid("rate bounds must satisfy 0 < min_rate <= max_rate"));
    }
    if !smoother.warmup_watts.is_finite() || smoother.warmup_watts <= 0.0 {
        return Err(invalid("warmup_watts must be > 0"));
    }
    if smoother.expected_tick.is_zero() {
        return Err(invalid("expected_tick must be > 0"));
    }
    if smoother.data_gap_factor < 1.0 {
        return Err(invalid("data_gap_factor must be >= 1.0"));
    }
    let (lo, hi) = detector.optimized_band;
    if !(0..=100).contains(&lo) || !(0..=100).contains(&hi) || lo > hi {
        return Err(invalid("optimized band must satisfy 0 <= low <= high <= 100"));
    }
    if detector.spike_ratio <= 1.0 {
        return Err(invalid("spike_ratio must be > 1.0"));
    }
    if detector.enter_ticks_thermal == 0
        || detector.enter_ticks_optimized == 0
        || detector.enter_ticks_spike == 0
        || detector.exit_ticks == 0
    {
        return Err(invalid("hysteresis tick counts must be >= 1"));
    }
    if presenter.confirm_count == 0 {
        return Err(invalid("confirm_count must be >= 1"));
    }
    if !(0.0..=1.0).contains(&presenter.rise_ratio) || !(0.0..=1.0).contains(&presenter.fall_ratio) {
        return Err(invalid("slew ratios must be in [0.0, 1.0]"));
    }
    if presenter.big_ratio <= 1.0 {
        return Err(invalid("big_ratio must be > 1.0"));
    }

    // ── Assemble ─────────────────────────────────────────────────────────────
    let profile = profile.sanitized();
    let mut gate = UnplugGate::new(session.unplug_confirm);
    if unplug_timer_thread {
        gate = gate.with_timer_thread(Arc::clone(&clock));
    }

    Ok(ChargeEngine::assemble(
        clock,
        Smoother::new(smoother, profile),
        PauseDetector::new(detector),
        EtaPresenter::new(presenter),
        SnapshotStore::new(profile, session.snapshot_debounce),
        writer,
        gate,
        persist,
        session,
    ))
}

impl EngineBuilder {
    pub fn with_profile(mut self, profile: DeviceProfile) -> Self {
        self.profile = Some(profile);
        self
    }
    pub fn with_smoother(mut self, cfg: SmootherCfg) -> Self {
        self.smoother = Some(cfg);
        self
    }
    pub fn with_detector(mut self, cfg: DetectorCfg) -> Self {
        self.detector = Some(cfg);
        self
    }
    pub fn with_presenter(mut self, cfg: PresenterCfg) -> Self {
        self.presenter = Some(cfg);
        self
    }
    pub fn with_persist(mut self, cfg: PersistCfg) -> Self {
        self.persist = Some(cfg);
        self
    }
    pub fn with_session(mut self, cfg: SessionCfg) -> Self {
        self.session = Some(cfg);
        self
    }
    /// Provide a custom clock; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
    /// Persist rows through `writer`. Without one, nothing is persisted.
    pub fn with_writer(mut self, writer: impl SeriesWriter + 'static) -> Self {
        self.writer = Some(Box::new(writer));
        self
    }
    /// Post unplug tickets from a timer thread instead of relying on polling alone.
    pub fn with_unplug_timer_thread(mut self, enabled: bool) -> Self {
        self.unplug_timer_thread = enabled;
        self
    }

    /// Take every section from a loaded config file.
    pub fn with_config(self, cfg: &chargecast_config::Config) -> Self {
        self.with_profile(DeviceProfile::from(&cfg.device))
            .with_smoother(SmootherCfg::from(&cfg.smoother))
            .with_detector(DetectorCfg::from(&cfg.detector))
            .with_presenter(PresenterCfg::from(&cfg.presenter))
            .with_persist(PersistCfg::from(&cfg.persistence))
            .with_session(SessionCfg::from(&cfg.session))
    }

    pub fn build(self) -> Result<ChargeEngine> {
        validate_and_build(
            self.profile.unwrap_or_default(),
            self.smoother.unwrap_or_default(),
            self.detector.unwrap_or_default(),
            self.presenter.unwrap_or_default(),
            self.persist.unwrap_or_default(),
            self.session.unwrap_or_default(),
            self.clock.unwrap_or_else(|| Arc::new(MonotonicClock::new())),
            self.writer,
            self.unplug_timer_thread,
        )
    }
}
