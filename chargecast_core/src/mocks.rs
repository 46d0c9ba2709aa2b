//! Test and helper doubles for chargecast_core.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chargecast_traits::{BatteryMonitor, RawSample, ThermalState};

use crate::persist::{PersistedRow, SeriesWriter, SessionId};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// In-memory series sink enforcing the `(session_id, ts)` uniqueness rule.
///
/// Clones share storage, so a test can keep one handle and give the other
/// to the engine.
#[derive(Debug, Clone, Default)]
pub struct MemoryWriter {
    rows: Arc<Mutex<Vec<PersistedRow>>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<PersistedRow> {
        self.rows.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn rows_for(&self, session: SessionId) -> Vec<PersistedRow> {
        self.rows()
            .into_iter()
            .filter(|r| r.session_id == session)
            .collect()
    }

    fn insert(&self, row: &PersistedRow) -> Result<bool, BoxError> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| std::io::Error::other("memory writer poisoned"))?;
        if rows
            .iter()
            .any(|r| r.session_id == row.session_id && r.ts == row.ts)
        {
            return Ok(false);
        }
        rows.push(row.clone());
        Ok(true)
    }
}

impl SeriesWriter for MemoryWriter {
    fn append(&mut self, row: &PersistedRow) -> Result<(), BoxError> {
        self.insert(row).map(|_| ())
    }

    fn insert_if_absent(&mut self, row: &PersistedRow) -> Result<bool, BoxError> {
        self.insert(row)
    }
}

/// Writer that always fails; exercises the non-fatal persistence path.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingWriter;

impl SeriesWriter for FailingWriter {
    fn append(&mut self, _row: &PersistedRow) -> Result<(), BoxError> {
        Err(Box::new(std::io::Error::other("store unavailable")))
    }

    fn insert_if_absent(&mut self, _row: &PersistedRow) -> Result<bool, BoxError> {
        Err(Box::new(std::io::Error::other("store unavailable")))
    }
}

/// One scripted battery reading; `None` simulates an observer error.
pub type Reading = Option<(i32, bool, ThermalState)>;

/// Battery that replays a fixed script and then repeats its last reading.
#[derive(Debug, Clone)]
pub struct ScriptedBattery {
    script: VecDeque<Reading>,
    last: (i32, bool, ThermalState),
}

impl ScriptedBattery {
    pub fn new(script: impl IntoIterator<Item = Reading>) -> Self {
        Self {
            script: script.into_iter().collect(),
            last: (0, false, ThermalState::Nominal),
        }
    }

    /// Convenience for scripts without thermal changes or errors.
    pub fn charging(socs: &[i32]) -> Self {
        Self::new(socs.iter().map(|&s| Some((s, true, ThermalState::Nominal))))
    }
}

impl BatteryMonitor for ScriptedBattery {
    fn read(&mut self, at: Instant) -> Result<RawSample, BoxError> {
        match self.script.pop_front() {
            Some(Some(reading)) => self.last = reading,
            Some(None) => return Err(Box::new(std::io::Error::other("scripted observer error"))),
            None => {}
        }
        let (soc, charging, thermal) = self.last;
        Ok(RawSample::new(at, soc, charging).with_thermal(thermal))
    }
}
