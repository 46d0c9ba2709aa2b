use std::sync::Arc;
use std::time::Duration;

use chargecast_core::mocks::{FailingWriter, MemoryWriter};
use chargecast_core::{
    ChargeEngine, ChargeError, ChargeState, EstimateSource, RejectReason, RowEvent, RowSource,
};
use chargecast_traits::{Clock, ManualClock, RawSample};

struct Rig {
    clock: ManualClock,
    rows: MemoryWriter,
    engine: ChargeEngine,
}

impl Rig {
    fn new() -> Self {
        let clock = ManualClock::starting_at(1_700_000_000.0);
        let rows = MemoryWriter::new();
        let engine = ChargeEngine::builder()
            .with_clock(Arc::new(clock.clone()))
            .with_writer(rows.clone())
            .build()
            .unwrap();
        Self { clock, rows, engine }
    }

    fn sample(&mut self, soc: i32, charging: bool) -> chargecast_core::TickReport {
        let s = RawSample::new(self.clock.now(), soc, charging);
        self.engine.tick(s).unwrap()
    }

    fn wait(&self, d: Duration) {
        self.clock.advance(d);
    }

    fn count(&self, event: RowEvent) -> usize {
        self.rows.rows().iter().filter(|r| r.event == event).count()
    }
}

#[test]
fn first_charging_sample_starts_a_session() {
    let mut rig = Rig::new();
    let r = rig.sample(40, true);
    let id = r.session.unwrap();
    assert_eq!(r.snapshot.state(), ChargeState::Charging);
    assert_eq!(r.estimate.source, EstimateSource::Warmup);

    let rows = rig.rows.rows_for(id);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].event, RowEvent::SessionStart);
    assert_eq!(rows[0].ts, 1_700_000_000.0);
}

#[test]
fn warmup_tick_matches_reference_numbers() {
    let mut rig = Rig::new();
    rig.sample(40, true);
    rig.wait(Duration::from_secs(30));
    let r = rig.sample(40, true);
    assert!((r.estimate.estimated_percent - 40.72).abs() < 0.01);
    assert_eq!(r.presented.minutes_to_full, Some(41));
    assert_eq!(r.snapshot.eta_minutes(), Some(41));
    assert_eq!(r.presented.formatted_text, "41 min");
}

#[test]
fn replug_inside_confirmation_window_keeps_session() {
    let mut rig = Rig::new();
    let id = rig.sample(40, true).session.unwrap();
    rig.wait(Duration::from_secs(30));
    rig.sample(40, true);
    rig.wait(Duration::from_secs(30));

    let r = rig.sample(40, false);
    assert_eq!(r.snapshot.state(), ChargeState::Unplugged);
    assert_eq!(r.snapshot.eta_minutes(), None);
    assert!(rig.engine.is_unplug_pending());

    rig.wait(Duration::from_millis(500));
    let r = rig.sample(40, true);
    assert_eq!(r.session, Some(id));
    assert!(!rig.engine.is_unplug_pending());

    rig.wait(Duration::from_secs(2));
    assert!(!rig.engine.settle_pending(rig.clock.now()));
    assert_eq!(rig.engine.session_id(), Some(id));
    assert_eq!(rig.count(RowEvent::SessionEnd), 0);
}

#[test]
fn confirmed_unplug_ends_session_once() {
    let mut rig = Rig::new();
    let id = rig.sample(55, true).session.unwrap();
    rig.wait(Duration::from_secs(30));
    rig.sample(55, false);
    rig.wait(Duration::from_millis(799));
    assert!(!rig.engine.settle_pending(rig.clock.now()));
    rig.wait(Duration::from_millis(1));
    assert!(rig.engine.settle_pending(rig.clock.now()));
    assert_eq!(rig.engine.session_id(), None);
    assert!(!rig.engine.settle_pending(rig.clock.now()));

    let rows = rig.rows.rows_for(id);
    let ends: Vec<_> = rows.iter().filter(|r| r.event == RowEvent::SessionEnd).collect();
    assert_eq!(ends.len(), 1);
    assert!(!ends[0].is_charging);
    assert_eq!(ends[0].eta_minutes, None);
    let mut ts: Vec<f64> = rows.iter().map(|r| r.ts).collect();
    ts.dedup();
    assert_eq!(ts.len(), rows.len(), "row timestamps are unique per session");
}

#[test]
fn late_sample_after_unplug_delay_starts_new_session() {
    let mut rig = Rig::new();
    let first = rig.sample(30, true).session.unwrap();
    rig.wait(Duration::from_secs(30));
    rig.sample(30, false);
    rig.wait(Duration::from_secs(30));
    let r = rig.sample(30, true);
    let second = r.session.unwrap();
    assert_ne!(first, second);
    assert_eq!(rig.engine.sessions_ended(), 1);
    assert_eq!(rig.count(RowEvent::SessionStart), 2);
}

#[test]
fn exactly_one_warmup_row_per_session() {
    let mut rig = Rig::new();
    let id = rig.sample(20, true).session.unwrap();
    for _ in 0..20 {
        rig.wait(Duration::from_secs(10));
        rig.sample(20, true);
    }
    let rows = rig.rows.rows_for(id);
    let warm = rows.iter().filter(|r| r.source == RowSource::Warmup).count();
    assert_eq!(warm, 1);
    assert!(rows.iter().any(|r| r.source == RowSource::Measured));
}

#[test]
fn measured_rows_respect_min_gap() {
    let mut rig = Rig::new();
    let id = rig.sample(20, true).session.unwrap();
    rig.wait(Duration::from_secs(95));
    for _ in 0..30 {
        rig.wait(Duration::from_secs(1));
        rig.sample(20, true);
    }
    let measured: Vec<f64> = rig
        .rows
        .rows_for(id)
        .into_iter()
        .filter(|r| r.source == RowSource::Measured)
        .map(|r| r.ts)
        .collect();
    assert!(measured.len() >= 5);
    for pair in measured.windows(2) {
        assert!(pair[1] - pair[0] >= 5.0, "{pair:?}");
    }
}

#[test]
fn full_battery_clears_eta_in_snapshot() {
    let mut rig = Rig::new();
    rig.sample(95, true);
    rig.wait(Duration::from_secs(30));
    let r = rig.sample(100, true);
    assert_eq!(r.estimate.minutes_to_full, Some(0));
    assert_eq!(r.snapshot.state(), ChargeState::Full);
    assert_eq!(r.snapshot.eta_minutes(), None);
    assert_eq!(r.snapshot.watts(), None);

    let row = rig
        .rows
        .rows_for(r.session.unwrap())
        .into_iter()
        .find(|row| row.event == RowEvent::Sample && row.ts == r.snapshot.timestamp())
        .expect("sample row for the full tick");
    assert_eq!(row.eta_minutes, r.snapshot.eta_minutes());
    assert_eq!(row.watts, r.snapshot.watts());
}

#[test]
fn unplug_inside_rate_limit_window_drops_eta() {
    let mut rig = Rig::new();
    rig.sample(40, true);
    rig.wait(Duration::from_secs(30));
    assert_eq!(rig.sample(40, true).presented.minutes_to_full, Some(41));

    rig.wait(Duration::from_millis(500));
    let r = rig.sample(40, false);
    assert_eq!(r.snapshot.state(), ChargeState::Unplugged);
    assert_eq!(r.snapshot.eta_minutes(), None);
    assert_eq!(r.presented.minutes_to_full, None);
    assert_eq!(r.presented.formatted_text, "--");
}

#[test]
fn negative_soc_is_rejected_without_mutation() {
    let mut rig = Rig::new();
    let before = rig.sample(40, true);
    rig.wait(Duration::from_secs(30));
    let err = rig
        .engine
        .tick(RawSample::new(rig.clock.now(), -3, true))
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ChargeError>(),
        Some(ChargeError::Rejected(RejectReason::NegativeSoc))
    ));
    assert_eq!(*rig.engine.snapshot(), *before.snapshot);
}

#[test]
fn out_of_order_sample_is_rejected() {
    let mut rig = Rig::new();
    let early = rig.clock.now();
    rig.wait(Duration::from_secs(5));
    rig.sample(40, true);
    let err = rig.engine.tick(RawSample::new(early, 41, true)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ChargeError>(),
        Some(ChargeError::Rejected(RejectReason::OutOfOrder))
    ));
}

#[test]
fn store_failures_do_not_stop_ticks() {
    let clock = ManualClock::new();
    let mut engine = ChargeEngine::builder()
        .with_clock(Arc::new(clock.clone()))
        .with_writer(FailingWriter)
        .build()
        .unwrap();
    for _ in 0..5 {
        engine.tick(RawSample::new(clock.now(), 50, true)).unwrap();
        clock.advance(Duration::from_secs(30));
    }
    assert!(engine.session_id().is_some());
}

#[test]
fn builder_rejects_inverted_band() {
    let err = ChargeEngine::builder()
        .with_detector(chargecast_core::DetectorCfg {
            optimized_band: (90, 80),
            ..Default::default()
        })
        .build()
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<chargecast_core::BuildError>(),
        Some(chargecast_core::BuildError::InvalidConfig(_))
    ));
}
