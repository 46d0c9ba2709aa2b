//! Persisted row model and the writer seam the engine appends through.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier minted at each charge begin and threaded through every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn mint() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.as_hyphenated().fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowEvent {
    Sample,
    SessionStart,
    SessionEnd,
}

impl RowEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            RowEvent::Sample => "sample",
            RowEvent::SessionStart => "session_start",
            RowEvent::SessionEnd => "session_end",
        }
    }
}

/// Where a row's numbers came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowSource {
    Warmup,
    Measured,
    Session,
}

impl RowSource {
    pub fn as_str(self) -> &'static str {
        match self {
            RowSource::Warmup => "warmup",
            RowSource::Measured => "measured",
            RowSource::Session => "session",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {field} value {value:?}")]
pub struct ParseRowError {
    pub field: &'static str,
    pub value: String,
}

impl FromStr for RowEvent {
    type Err = ParseRowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sample" => Ok(RowEvent::Sample),
            "session_start" => Ok(RowEvent::SessionStart),
            "session_end" => Ok(RowEvent::SessionEnd),
            other => Err(ParseRowError {
                field: "event",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for RowSource {
    type Err = ParseRowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warmup" => Ok(RowSource::Warmup),
            "measured" => Ok(RowSource::Measured),
            "session" => Ok(RowSource::Session),
            other => Err(ParseRowError {
                field: "src",
                value: other.to_string(),
            }),
        }
    }
}

/// One row of the charging time series. Unique on `(session_id, ts)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRow {
    /// Wall time in whole UNIX seconds.
    pub ts: f64,
    pub session_id: SessionId,
    pub is_charging: bool,
    pub soc: i32,
    pub watts: Option<f64>,
    pub eta_minutes: Option<u32>,
    pub event: RowEvent,
    pub source: RowSource,
}

/// Append sink for persisted rows.
///
/// Implementations must treat a second write of the same `(session_id, ts)`
/// as a no-op rather than an error.
pub trait SeriesWriter: Send {
    fn append(&mut self, row: &PersistedRow) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Insert unless a row with the same key exists. Returns whether the row
    /// was accepted; queued writers report `true` once enqueued.
    fn insert_if_absent(
        &mut self,
        row: &PersistedRow,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;
}

impl<W: SeriesWriter + ?Sized> SeriesWriter for Box<W> {
    fn append(&mut self, row: &PersistedRow) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).append(row)
    }

    fn insert_if_absent(
        &mut self,
        row: &PersistedRow,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        (**self).insert_if_absent(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_round_trips_through_text() {
        let id = SessionId::mint();
        let back: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, back);
        assert_ne!(id, SessionId::mint());
    }

    #[test]
    fn unknown_event_is_rejected() {
        let err = "sessionstart".parse::<RowEvent>().unwrap_err();
        assert_eq!(err.field, "event");
        assert_eq!("session_end".parse::<RowEvent>().unwrap(), RowEvent::SessionEnd);
    }
}
