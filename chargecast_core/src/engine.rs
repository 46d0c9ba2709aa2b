//! The charging session engine (`ChargeEngine`).
//!
//! Owns every pipeline stage and drives them from a single serialized
//! `tick`: validate sample → smoother → detector → presenter → snapshot,
//! with a throttled subset of ticks written to the series store. Session
//! boundaries (begin on charge, end on confirmed unplug) live here too.

use std::sync::Arc;
use std::time::Instant;

use chargecast_traits::{Clock, RawSample};
use serde::Serialize;

use crate::collab_error::{Collaborator, map_collab_error};
use crate::config::{PersistCfg, SessionCfg};
use crate::detector::{DetectorInput, PauseDetector, PauseStatus};
use crate::error::{ChargeError, RejectReason, Result};
use crate::persist::{PersistedRow, RowEvent, RowSource, SeriesWriter, SessionId};
use crate::presenter::{EtaPresenter, PresentedOutput, PresenterInput, TickToken};
use crate::profile::DeviceProfile;
use crate::smoother::{SmoothedEstimate, Smoother};
use crate::snapshot::{ChargeState, ChargingSnapshot, SnapshotCandidate, SnapshotReader, SnapshotStore};
use crate::unplug::{UnplugGate, UnplugTicket};
use crate::util::format_eta;

/// Everything one tick produced.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub tick: TickToken,
    pub session: Option<SessionId>,
    pub snapshot: Arc<ChargingSnapshot>,
    /// Snapshot ETA as display text.
    pub eta_text: String,
    #[serde(skip)]
    pub presented: PresentedOutput,
    #[serde(skip)]
    pub pause: PauseStatus,
    #[serde(skip)]
    pub estimate: SmoothedEstimate,
}

impl TickReport {
    pub fn pause_reason(&self) -> Option<&'static str> {
        self.pause.reason.map(|r| r.code())
    }
}

#[derive(Debug)]
struct ActiveSession {
    id: SessionId,
    started_at: Instant,
    warmup_row_written: bool,
    last_measured_at: Option<Instant>,
    last_row_ts: Option<f64>,
    last_soc: i32,
}

pub struct ChargeEngine {
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) smoother: Smoother,
    pub(crate) detector: PauseDetector,
    pub(crate) presenter: EtaPresenter,
    pub(crate) snapshots: SnapshotStore,
    pub(crate) writer: Option<Box<dyn SeriesWriter>>,
    pub(crate) gate: UnplugGate,
    pub(crate) persist: PersistCfg,
    pub(crate) session_cfg: SessionCfg,
    session: Option<ActiveSession>,
    last_sample_at: Option<Instant>,
    tick_seq: TickToken,
    sessions_ended: u64,
}

impl core::fmt::Debug for ChargeEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChargeEngine")
            .field("session", &self.session.as_ref().map(|s| s.id))
            .field("tick", &self.tick_seq)
            .field("profile", &self.smoother.profile())
            .field("persisting", &self.writer.is_some())
            .finish()
    }
}

impl ChargeEngine {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        clock: Arc<dyn Clock + Send + Sync>,
        smoother: Smoother,
        detector: PauseDetector,
        presenter: EtaPresenter,
        snapshots: SnapshotStore,
        writer: Option<Box<dyn SeriesWriter>>,
        gate: UnplugGate,
        persist: PersistCfg,
        session_cfg: SessionCfg,
    ) -> Self {
        Self {
            clock,
            smoother,
            detector,
            presenter,
            snapshots,
            writer,
            gate,
            persist,
            session_cfg,
            session: None,
            last_sample_at: None,
            tick_seq: 0,
            sessions_ended: 0,
        }
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn is_unplug_pending(&self) -> bool {
        self.gate.is_armed()
    }

    pub fn sessions_ended(&self) -> u64 {
        self.sessions_ended
    }

    pub fn profile(&self) -> DeviceProfile {
        self.smoother.profile()
    }

    pub fn session_cfg(&self) -> &SessionCfg {
        &self.session_cfg
    }

    pub fn snapshot(&self) -> Arc<ChargingSnapshot> {
        self.snapshots.current()
    }

    pub fn reader(&self) -> SnapshotReader {
        self.snapshots.reader()
    }

    /// Debounced snapshot stream.
    pub fn subscribe(&mut self) -> crossbeam_channel::Receiver<Arc<ChargingSnapshot>> {
        self.snapshots.subscribe()
    }

    /// Receiver for unplug tickets posted by the timer thread, if enabled.
    pub fn unplug_tickets(&self) -> crossbeam_channel::Receiver<UnplugTicket> {
        self.gate.tickets()
    }

    /// Reconcile the device profile once it resolves. ETA stays continuous.
    pub fn set_profile(&mut self, profile: DeviceProfile) {
        self.smoother.set_profile(profile);
    }

    /// Run one pipeline iteration for `sample`.
    ///
    /// Negative or out-of-order samples are rejected without touching state.
    pub fn tick(&mut self, sample: RawSample) -> Result<TickReport> {
        if sample.soc_percent < 0 {
            tracing::warn!(soc = sample.soc_percent, "dropping sample with negative SoC");
            return Err(ChargeError::Rejected(RejectReason::NegativeSoc).into());
        }
        if let Some(prev) = self.last_sample_at
            && sample.at < prev
        {
            tracing::warn!("dropping sample older than the previous one");
            return Err(ChargeError::Rejected(RejectReason::OutOfOrder).into());
        }
        let now = sample.at;
        let soc = sample.soc_percent.min(100);
        self.last_sample_at = Some(now);
        self.tick_seq = self.tick_seq.wrapping_add(1);
        let tick = self.tick_seq;

        // An unplug whose delay ran out before this sample ends the session first.
        self.settle_pending(now);

        if sample.is_charging {
            if self.gate.invalidate() {
                tracing::info!(soc, "replugged inside unplug window; session continues");
            }
            if self.session.is_none() {
                self.begin_session(soc, now);
            }
        }

        let est = self.smoother.tick(soc, sample.is_charging, now);
        let (pause, display) = self.detector.evaluate(
            DetectorInput {
                is_charging: sample.is_charging,
                system_percent: soc,
                in_warmup: est.in_warmup(),
                smoothed_eta: est.minutes_to_full,
                smoothed_watts: est.watts,
                thermal: sample.thermal,
                data_gap: est.data_gap,
                stale_step: est.is_stale(),
            },
            now,
        );
        let presented = self.presenter.presented(
            PresenterInput {
                raw_eta: display.eta,
                watts: display.watts,
                sys_pct: soc,
                is_charging: sample.is_charging,
                is_warmup: est.in_warmup(),
                tick,
            },
            now,
        );

        let state = if !sample.is_charging {
            ChargeState::Unplugged
        } else if soc >= 100 {
            ChargeState::Full
        } else {
            ChargeState::Charging
        };
        let rate = if pause.is_paused {
            self.smoother.profile().rate_for_watts(display.watts)
        } else {
            est.rate_pct_per_min
        };
        let snapshot = self.snapshots.apply(
            SnapshotCandidate {
                timestamp: self.clock.unix_at(now),
                soc_percent: soc,
                state,
                watts: Some(display.watts),
                rate_pct_per_min: Some(rate),
                eta_minutes: presented.minutes_to_full,
                device_profile: self.smoother.profile(),
            },
            now,
        );

        self.persist_tick(&sample, soc, &est, &snapshot);

        if !sample.is_charging && self.session.is_some() && !self.gate.is_armed() {
            self.gate.arm(now);
            tracing::info!(soc, "unplug observed; awaiting confirmation");
        }
        self.snapshots.poll_notifications(now);

        Ok(TickReport {
            tick,
            session: self.session_id(),
            eta_text: format_eta(snapshot.eta_minutes()),
            snapshot,
            presented,
            pause,
            estimate: est,
        })
    }

    /// End the session if a pending unplug has become due. Returns whether
    /// a session ended.
    pub fn settle_pending(&mut self, now: Instant) -> bool {
        self.snapshots.poll_notifications(now);
        match self.gate.due(now) {
            Some(ticket) => self.confirm_unplug(ticket, now),
            None => false,
        }
    }

    /// Consume an unplug ticket; stale tickets are ignored.
    pub fn confirm_unplug(&mut self, ticket: UnplugTicket, now: Instant) -> bool {
        if !self.gate.confirm(ticket) {
            return false;
        }
        self.end_session(now);
        true
    }

    fn begin_session(&mut self, soc: i32, now: Instant) {
        let id = SessionId::mint();
        self.smoother.begin(soc, now);
        self.detector.reset();
        self.presenter.reset_session();
        let mut session = ActiveSession {
            id,
            started_at: now,
            warmup_row_written: false,
            last_measured_at: None,
            last_row_ts: None,
            last_soc: soc,
        };
        tracing::info!(session = %id, soc, "charging session started");
        let row = PersistedRow {
            ts: self.row_ts(now, None),
            session_id: id,
            is_charging: true,
            soc,
            watts: None,
            eta_minutes: None,
            event: RowEvent::SessionStart,
            source: RowSource::Session,
        };
        if self.write_row(&row) {
            session.last_row_ts = Some(row.ts);
        }
        self.session = Some(session);
    }

    fn end_session(&mut self, now: Instant) {
        let Some(session) = self.session.take() else {
            return;
        };
        self.smoother.end(now);
        self.detector.reset();
        self.presenter.reset_session();
        self.sessions_ended = self.sessions_ended.saturating_add(1);
        let row = PersistedRow {
            ts: self.row_ts(now, session.last_row_ts),
            session_id: session.id,
            is_charging: false,
            soc: session.last_soc,
            watts: None,
            eta_minutes: None,
            event: RowEvent::SessionEnd,
            source: RowSource::Session,
        };
        self.write_row(&row);
        tracing::info!(
            session = %session.id,
            soc = session.last_soc,
            duration_secs = crate::util::whole_secs(now.saturating_duration_since(session.started_at)),
            "charging session ended"
        );
    }

    fn persist_tick(
        &mut self,
        sample: &RawSample,
        soc: i32,
        est: &SmoothedEstimate,
        snapshot: &ChargingSnapshot,
    ) {
        let now = sample.at;
        let min_gap = self.persist.min_gap;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.last_soc = soc;
        let ts = crate::util::floor_secs(self.clock.unix_at(now));
        if session.last_row_ts.is_some_and(|last| ts <= last) {
            return;
        }

        let source = if est.in_warmup() {
            if session.warmup_row_written {
                return;
            }
            RowSource::Warmup
        } else {
            let due = session
                .last_measured_at
                .is_none_or(|t| now.saturating_duration_since(t) >= min_gap);
            if !due {
                return;
            }
            RowSource::Measured
        };

        let row = PersistedRow {
            ts,
            session_id: session.id,
            is_charging: sample.is_charging,
            soc,
            watts: snapshot.watts(),
            eta_minutes: snapshot.eta_minutes(),
            event: RowEvent::Sample,
            source,
        };
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        match writer.insert_if_absent(&row) {
            Ok(_) => {
                session.last_row_ts = Some(ts);
                match source {
                    RowSource::Warmup => session.warmup_row_written = true,
                    _ => session.last_measured_at = Some(now),
                }
            }
            Err(e) => {
                let err = map_collab_error(Collaborator::Store, e.as_ref());
                tracing::warn!(error = %err, "series write failed; continuing");
            }
        }
    }

    fn write_row(&mut self, row: &PersistedRow) -> bool {
        let Some(writer) = self.writer.as_mut() else {
            return false;
        };
        match writer.insert_if_absent(row) {
            Ok(_) => true,
            Err(e) => {
                let err = map_collab_error(Collaborator::Store, e.as_ref());
                tracing::warn!(event = row.event.as_str(), error = %err, "series write failed; continuing");
                false
            }
        }
    }

    /// Whole-second row timestamp strictly after `after`.
    fn row_ts(&self, now: Instant, after: Option<f64>) -> f64 {
        let ts = crate::util::floor_secs(self.clock.unix_at(now));
        match after {
            Some(last) if ts <= last => last + 1.0,
            _ => ts,
        }
    }
}
