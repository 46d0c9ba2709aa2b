//! Canonical charging snapshot and its single write entry point.
//!
//! `SnapshotStore::apply` is the only way a `ChargingSnapshot` comes into
//! existence. It clears ETA, watts and rate whenever the state is not
//! `Charging`, whatever the caller supplied. Readers get immutable copies
//! through `SnapshotReader` or the debounced subscription channel.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use serde::Serialize;

use crate::notify::Coalescer;
use crate::profile::DeviceProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeState {
    Unplugged,
    Charging,
    Full,
    Unknown,
}

impl ChargeState {
    pub fn as_str(self) -> &'static str {
        match self {
            ChargeState::Unplugged => "unplugged",
            ChargeState::Charging => "charging",
            ChargeState::Full => "full",
            ChargeState::Unknown => "unknown",
        }
    }
}

/// What a caller would like the snapshot to say.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotCandidate {
    pub timestamp: f64,
    pub soc_percent: i32,
    pub state: ChargeState,
    pub watts: Option<f64>,
    pub rate_pct_per_min: Option<f64>,
    pub eta_minutes: Option<u32>,
    pub device_profile: DeviceProfile,
}

/// The canonical snapshot. Fields are private; construct via [`SnapshotStore::apply`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChargingSnapshot {
    timestamp: f64,
    soc_percent: i32,
    state: ChargeState,
    watts: Option<f64>,
    rate_pct_per_min: Option<f64>,
    eta_minutes: Option<u32>,
    device_profile: DeviceProfile,
}

impl ChargingSnapshot {
    fn initial(profile: DeviceProfile) -> Self {
        Self {
            timestamp: 0.0,
            soc_percent: 0,
            state: ChargeState::Unknown,
            watts: None,
            rate_pct_per_min: None,
            eta_minutes: None,
            device_profile: profile,
        }
    }

    fn gated(c: SnapshotCandidate) -> Self {
        let charging = c.state == ChargeState::Charging;
        let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
        Self {
            timestamp: c.timestamp,
            soc_percent: c.soc_percent.clamp(0, 100),
            state: c.state,
            watts: if charging { finite(c.watts) } else { None },
            rate_pct_per_min: if charging {
                finite(c.rate_pct_per_min)
            } else {
                None
            },
            eta_minutes: if charging { c.eta_minutes } else { None },
            device_profile: c.device_profile,
        }
    }

    /// Wall time of the tick that produced this snapshot (UNIX seconds).
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }
    pub fn soc_percent(&self) -> i32 {
        self.soc_percent
    }
    pub fn state(&self) -> ChargeState {
        self.state
    }
    pub fn watts(&self) -> Option<f64> {
        self.watts
    }
    pub fn rate_pct_per_min(&self) -> Option<f64> {
        self.rate_pct_per_min
    }
    pub fn eta_minutes(&self) -> Option<u32> {
        self.eta_minutes
    }
    pub fn device_profile(&self) -> DeviceProfile {
        self.device_profile
    }
    pub fn is_charging(&self) -> bool {
        self.state == ChargeState::Charging
    }
}

/// Cloneable read handle onto the current snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    current: Arc<RwLock<Arc<ChargingSnapshot>>>,
}

impl SnapshotReader {
    pub fn current(&self) -> Arc<ChargingSnapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }
}

#[derive(Debug)]
pub struct SnapshotStore {
    current: Arc<RwLock<Arc<ChargingSnapshot>>>,
    fanout: Coalescer<Arc<ChargingSnapshot>>,
}

impl SnapshotStore {
    pub fn new(profile: DeviceProfile, debounce: Duration) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(ChargingSnapshot::initial(profile)))),
            fanout: Coalescer::new(debounce),
        }
    }

    /// Replace the canonical snapshot. Returns the stored value.
    pub fn apply(&mut self, candidate: SnapshotCandidate, now: Instant) -> Arc<ChargingSnapshot> {
        if candidate.state != ChargeState::Charging && candidate.eta_minutes.is_some() {
            tracing::trace!(
                state = candidate.state.as_str(),
                "dropping ETA from non-charging snapshot"
            );
        }
        let snap = Arc::new(ChargingSnapshot::gated(candidate));
        match self.current.write() {
            Ok(mut guard) => *guard = Arc::clone(&snap),
            Err(poisoned) => *poisoned.into_inner() = Arc::clone(&snap),
        }
        self.fanout.publish(Arc::clone(&snap), now);
        snap
    }

    pub fn current(&self) -> Arc<ChargingSnapshot> {
        self.reader().current()
    }

    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            current: Arc::clone(&self.current),
        }
    }

    /// Debounced stream of applied snapshots.
    pub fn subscribe(&mut self) -> xch::Receiver<Arc<ChargingSnapshot>> {
        self.fanout.subscribe()
    }

    /// Release a debounced snapshot whose window has elapsed.
    pub fn poll_notifications(&mut self, now: Instant) -> bool {
        self.fanout.poll(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(state: ChargeState) -> SnapshotCandidate {
        SnapshotCandidate {
            timestamp: 1.0,
            soc_percent: 55,
            state,
            watts: Some(9.5),
            rate_pct_per_min: Some(1.2),
            eta_minutes: Some(37),
            device_profile: DeviceProfile::default(),
        }
    }

    #[test]
    fn charging_keeps_estimates() {
        let mut store = SnapshotStore::new(DeviceProfile::default(), Duration::from_millis(600));
        let s = store.apply(candidate(ChargeState::Charging), Instant::now());
        assert_eq!(s.eta_minutes(), Some(37));
        assert_eq!(s.watts(), Some(9.5));
    }

    #[test]
    fn reader_sees_latest_apply() {
        let mut store = SnapshotStore::new(DeviceProfile::default(), Duration::from_millis(600));
        let reader = store.reader();
        assert_eq!(reader.current().state(), ChargeState::Unknown);
        store.apply(candidate(ChargeState::Full), Instant::now());
        assert_eq!(reader.current().state(), ChargeState::Full);
        assert_eq!(reader.current().eta_minutes(), None);
    }
}
