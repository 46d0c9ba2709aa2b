//! Synchronous SQLite-backed series store.
//!
//! Rows are unique on `(session_id, ts)`; every write path uses
//! `INSERT OR IGNORE`, so repeating a write is a no-op. Change notifications
//! go through a `Coalescer` and fire at most once per window.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chargecast_core::{Coalescer, PersistedRow, SessionId};
use chargecast_traits::{Clock, MonotonicClock};
use crossbeam_channel as xch;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::StoreError;
use crate::migrations::run_migrations;

const SECS_PER_DAY: f64 = 86_400.0;

const SELECT_COLUMNS: &str =
    "SELECT ts, session_id, is_charging, soc, watts, eta_minutes, event, src FROM charge_samples";

/// Coalesced change notification.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesChanged {
    Appended { session_id: SessionId, ts: f64 },
    Trimmed { removed: usize },
}

pub struct TimeSeriesStore {
    conn: Connection,
    path: Option<PathBuf>,
    clock: Arc<dyn Clock + Send + Sync>,
    notify: Coalescer<SeriesChanged>,
}

impl core::fmt::Debug for TimeSeriesStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TimeSeriesStore")
            .field("path", &self.path)
            .field("subscribers", &self.notify.subscriber_count())
            .finish()
    }
}

fn decode_err<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn row_from_sql(row: &Row<'_>) -> rusqlite::Result<PersistedRow> {
    let session: String = row.get(1)?;
    let event: String = row.get(6)?;
    let source: String = row.get(7)?;
    Ok(PersistedRow {
        ts: row.get(0)?,
        session_id: session.parse().map_err(|e| decode_err(1, e))?,
        is_charging: row.get(2)?,
        soc: row.get(3)?,
        watts: row.get(4)?,
        eta_minutes: row.get(5)?,
        event: event.parse().map_err(|e| decode_err(6, e))?,
        source: source.parse().map_err(|e| decode_err(7, e))?,
    })
}

impl TimeSeriesStore {
    /// Open (creating if needed) the store at `path`.
    pub fn open(path: impl AsRef<Path>, notify_window: Duration) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            tracing::warn!(error = %err, "failed to enable WAL mode");
        }
        let store = Self::init(conn, Some(path), notify_window)?;
        tracing::info!(path = ?store.path, "series store opened");
        Ok(store)
    }

    pub fn open_in_memory(notify_window: Duration) -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, None, notify_window)
    }

    fn init(mut conn: Connection, path: Option<PathBuf>, notify_window: Duration) -> Result<Self, StoreError> {
        run_migrations(&mut conn)?;
        Ok(Self {
            conn,
            path,
            clock: Arc::new(MonotonicClock::new()),
            notify: Coalescer::new(notify_window),
        })
    }

    /// Clock used for notification timing.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append a row; a duplicate key is silently ignored.
    pub fn append(&mut self, row: &PersistedRow) -> Result<(), StoreError> {
        self.insert_if_absent(row).map(|_| ())
    }

    /// Insert unless `(session_id, ts)` exists. Returns whether a row was added.
    pub fn insert_if_absent(&mut self, row: &PersistedRow) -> Result<bool, StoreError> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO charge_samples
                 (ts, session_id, is_charging, soc, watts, eta_minutes, event, src)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                row.ts,
                row.session_id.to_string(),
                row.is_charging,
                row.soc,
                row.watts,
                row.eta_minutes,
                row.event.as_str(),
                row.source.as_str(),
            ],
        )?;
        if changed == 0 {
            tracing::trace!(session = %row.session_id, ts = row.ts, "duplicate row ignored");
            return Ok(false);
        }
        let now = self.clock.now();
        self.notify.publish(
            SeriesChanged::Appended {
                session_id: row.session_id,
                ts: row.ts,
            },
            now,
        );
        Ok(true)
    }

    /// Rows with `from <= ts <= to`, oldest first.
    pub fn range(&self, from: f64, to: f64) -> Result<Vec<PersistedRow>, StoreError> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{SELECT_COLUMNS} WHERE ts >= ?1 AND ts <= ?2 ORDER BY ts ASC, id ASC"
        ))?;
        let rows = stmt
            .query_map(params![from, to], row_from_sql)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn rows_for_session(&self, session: SessionId) -> Result<Vec<PersistedRow>, StoreError> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{SELECT_COLUMNS} WHERE session_id = ?1 ORDER BY ts ASC, id ASC"
        ))?;
        let rows = stmt
            .query_map(params![session.to_string()], row_from_sql)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Most recent row, if any.
    pub fn latest(&self) -> Result<Option<PersistedRow>, StoreError> {
        let row = self
            .conn
            .query_row(
                &format!("{SELECT_COLUMNS} ORDER BY ts DESC, id DESC LIMIT 1"),
                [],
                row_from_sql,
            )
            .optional()?;
        Ok(row)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM charge_samples", [], |r| r.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    /// Delete rows older than `older_than_days` before `now_unix`.
    pub fn trim(&mut self, older_than_days: u32, now_unix: f64) -> Result<usize, StoreError> {
        let cutoff = now_unix - f64::from(older_than_days) * SECS_PER_DAY;
        let removed = self
            .conn
            .execute("DELETE FROM charge_samples WHERE ts < ?1", params![cutoff])?;
        if removed > 0 {
            tracing::info!(removed, older_than_days, "trimmed series rows");
            let now = self.clock.now();
            self.notify.publish(SeriesChanged::Trimmed { removed }, now);
        }
        Ok(removed)
    }

    /// Coalesced change stream.
    pub fn subscribe(&mut self) -> xch::Receiver<SeriesChanged> {
        self.notify.subscribe()
    }

    /// Release a held notification whose window elapsed. Returns whether one fired.
    pub fn flush_notifications(&mut self) -> bool {
        let now = self.clock.now();
        self.notify.poll(now)
    }

    /// Time until a held notification is due, if any.
    pub fn next_notification_due(&self) -> Option<Duration> {
        self.notify.next_due(self.clock.now())
    }
}
