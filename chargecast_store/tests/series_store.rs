use std::sync::Arc;
use std::time::Duration;

use chargecast_core::{PersistedRow, RowEvent, RowSource, SessionId};
use chargecast_store::{SeriesChanged, StoreError, TimeSeriesStore};
use chargecast_traits::ManualClock;
use rstest::rstest;

const T0: f64 = 1_700_000_000.0;

fn row(session: SessionId, ts: f64, soc: i32) -> PersistedRow {
    PersistedRow {
        ts,
        session_id: session,
        is_charging: true,
        soc,
        watts: Some(10.0),
        eta_minutes: Some(42),
        event: RowEvent::Sample,
        source: RowSource::Measured,
    }
}

fn memory() -> TimeSeriesStore {
    TimeSeriesStore::open_in_memory(Duration::from_secs(1)).unwrap()
}

#[test]
fn duplicate_key_is_ignored() {
    let mut store = memory();
    let s = SessionId::mint();
    assert!(store.insert_if_absent(&row(s, T0, 40)).unwrap());
    assert!(!store.insert_if_absent(&row(s, T0, 41)).unwrap());
    store.append(&row(s, T0, 42)).unwrap();
    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(store.latest().unwrap().unwrap().soc, 40);
}

#[test]
fn same_ts_in_another_session_is_a_new_row() {
    let mut store = memory();
    store.append(&row(SessionId::mint(), T0, 40)).unwrap();
    store.append(&row(SessionId::mint(), T0, 40)).unwrap();
    assert_eq!(store.count().unwrap(), 2);
}

#[test]
fn null_columns_round_trip() {
    let mut store = memory();
    let s = SessionId::mint();
    let end = PersistedRow {
        ts: T0,
        session_id: s,
        is_charging: false,
        soc: 63,
        watts: None,
        eta_minutes: None,
        event: RowEvent::SessionEnd,
        source: RowSource::Session,
    };
    store.append(&end).unwrap();
    assert_eq!(store.rows_for_session(s).unwrap(), vec![end]);
}

#[test]
fn range_is_inclusive_and_ordered() {
    let mut store = memory();
    let s = SessionId::mint();
    for (i, ts) in [T0 + 30.0, T0, T0 + 10.0, T0 + 20.0].into_iter().enumerate() {
        store.append(&row(s, ts, 40 + i as i32)).unwrap();
    }
    let got: Vec<f64> = store
        .range(T0 + 10.0, T0 + 30.0)
        .unwrap()
        .into_iter()
        .map(|r| r.ts)
        .collect();
    assert_eq!(got, vec![T0 + 10.0, T0 + 20.0, T0 + 30.0]);
    assert!(store.range(T0 + 31.0, T0 + 99.0).unwrap().is_empty());
}

#[rstest]
#[case(1, 2)]
#[case(3, 1)]
#[case(10, 0)]
fn trim_drops_rows_older_than_cutoff(#[case] days: u32, #[case] removed: usize) {
    let mut store = memory();
    let s = SessionId::mint();
    let day = 86_400.0;
    let now = T0 + 10.0 * day;
    store.append(&row(s, now - 5.0 * day, 40)).unwrap();
    store.append(&row(s, now - 2.0 * day, 41)).unwrap();
    store.append(&row(s, now - 60.0, 42)).unwrap();
    assert_eq!(store.trim(days, now).unwrap(), removed);
    assert_eq!(store.count().unwrap(), 3 - removed);
}

#[test]
fn burst_of_writes_is_coalesced() {
    let clock = ManualClock::starting_at(T0);
    let mut store = memory().with_clock(Arc::new(clock.clone()));
    let rx = store.subscribe();
    let s = SessionId::mint();

    for i in 0..5 {
        store.append(&row(s, T0 + f64::from(i), 40 + i)).unwrap();
        clock.advance(Duration::from_millis(100));
    }
    assert_eq!(rx.try_iter().count(), 1);
    assert!(store.next_notification_due().is_some());
    assert!(!store.flush_notifications());

    clock.advance(Duration::from_millis(600));
    assert!(store.flush_notifications());
    let trailing: Vec<_> = rx.try_iter().collect();
    assert_eq!(
        trailing,
        vec![SeriesChanged::Appended {
            session_id: s,
            ts: T0 + 4.0
        }]
    );
    assert_eq!(store.next_notification_due(), None);
}

#[test]
fn duplicate_write_does_not_notify() {
    let mut store = memory();
    let rx = store.subscribe();
    let s = SessionId::mint();
    store.append(&row(s, T0, 40)).unwrap();
    assert_eq!(rx.try_iter().count(), 1);
    store.append(&row(s, T0, 40)).unwrap();
    assert!(!store.flush_notifications());
    assert_eq!(rx.try_iter().count(), 0);
}

#[test]
fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("charge.db");
    let s = SessionId::mint();
    {
        let mut store = TimeSeriesStore::open(&path, Duration::from_secs(1)).unwrap();
        store.append(&row(s, T0, 40)).unwrap();
        store.append(&row(s, T0 + 5.0, 41)).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
    }
    let store = TimeSeriesStore::open(&path, Duration::from_secs(1)).unwrap();
    let rows = store.rows_for_session(s).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].soc, 41);
}

#[test]
fn newer_schema_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.pragma_update(None, "user_version", 99).unwrap();
    }
    let err = TimeSeriesStore::open(&path, Duration::from_secs(1)).unwrap_err();
    assert!(matches!(err, StoreError::SchemaTooNew { found: 99, .. }));
}
