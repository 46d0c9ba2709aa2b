//! Background owner of the series store.
//!
//! The engine's tick path must never block on SQLite, so `SeriesWorker`
//! moves the `TimeSeriesStore` onto a dedicated thread and hands out a
//! cloneable handle. Row writes are fire-and-forget; queries round-trip
//! through a reply channel. Held notifications are flushed on a timer
//! inside the worker loop.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chargecast_core::{PersistedRow, SeriesWriter, SessionId};
use crossbeam_channel as xch;

use crate::error::StoreError;
use crate::store::{SeriesChanged, TimeSeriesStore};

type StoreTask = Box<dyn FnOnce(&mut TimeSeriesStore) + Send + 'static>;

/// Idle wake-up when nothing is held for notification.
const IDLE_WAKE: Duration = Duration::from_millis(500);

enum StoreCommand {
    Write(PersistedRow),
    Execute(StoreTask),
    Shutdown,
}

struct WorkerInner {
    sender: xch::Sender<StoreCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for WorkerInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(StoreCommand::Shutdown) {
                tracing::error!(error = %err, "failed to send shutdown to store thread");
            }
            if let Err(join_err) = handle.join() {
                tracing::error!(?join_err, "failed to join store thread");
            }
        }
    }
}

/// Cloneable handle onto the store thread. The thread stops when the last
/// handle is dropped.
#[derive(Clone)]
pub struct SeriesWorker {
    inner: Arc<WorkerInner>,
}

impl core::fmt::Debug for SeriesWorker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SeriesWorker")
            .field("queued", &self.inner.sender.len())
            .finish()
    }
}

fn run_loop(mut store: TimeSeriesStore, rx: xch::Receiver<StoreCommand>) {
    loop {
        let wait = store.next_notification_due().unwrap_or(IDLE_WAKE);
        match rx.recv_timeout(wait) {
            Ok(StoreCommand::Write(row)) => {
                if let Err(err) = store.insert_if_absent(&row) {
                    tracing::warn!(error = %err, session = %row.session_id, ts = row.ts, "series write failed");
                }
            }
            Ok(StoreCommand::Execute(task)) => task(&mut store),
            Ok(StoreCommand::Shutdown) | Err(xch::RecvTimeoutError::Disconnected) => break,
            Err(xch::RecvTimeoutError::Timeout) => {}
        }
        store.flush_notifications();
    }
    tracing::info!("store thread shutting down");
}

impl SeriesWorker {
    pub fn spawn(store: TimeSeriesStore) -> Result<Self, StoreError> {
        let (tx, rx) = xch::unbounded::<StoreCommand>();
        let worker = thread::Builder::new()
            .name("chargecast-store".into())
            .spawn(move || run_loop(store, rx))?;
        Ok(Self {
            inner: Arc::new(WorkerInner {
                sender: tx,
                worker: Mutex::new(Some(worker)),
            }),
        })
    }

    /// Run `task` on the store thread and wait for its result.
    pub fn execute<F, T>(&self, task: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut TimeSeriesStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = xch::bounded(1);
        let command = StoreCommand::Execute(Box::new(move |store| {
            if reply_tx.send(task(store)).is_err() {
                tracing::error!("store caller dropped before receiving result");
            }
        }));
        self.inner
            .sender
            .send(command)
            .map_err(|_| StoreError::WorkerGone)?;
        reply_rx.recv().map_err(|_| StoreError::WorkerGone)?
    }

    /// Queue a row without waiting.
    pub fn enqueue(&self, row: PersistedRow) -> Result<(), StoreError> {
        self.inner
            .sender
            .send(StoreCommand::Write(row))
            .map_err(|_| StoreError::WorkerGone)
    }

    /// Wait until every previously queued write has been applied.
    pub fn sync(&self) -> Result<(), StoreError> {
        self.execute(|_| Ok(()))
    }

    pub fn range(&self, from: f64, to: f64) -> Result<Vec<PersistedRow>, StoreError> {
        self.execute(move |s| s.range(from, to))
    }

    pub fn rows_for_session(&self, session: SessionId) -> Result<Vec<PersistedRow>, StoreError> {
        self.execute(move |s| s.rows_for_session(session))
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        self.execute(|s| s.count())
    }

    pub fn trim(&self, older_than_days: u32, now_unix: f64) -> Result<usize, StoreError> {
        self.execute(move |s| s.trim(older_than_days, now_unix))
    }

    pub fn subscribe(&self) -> Result<xch::Receiver<SeriesChanged>, StoreError> {
        self.execute(|s| Ok(s.subscribe()))
    }
}

impl SeriesWriter for SeriesWorker {
    fn append(&mut self, row: &PersistedRow) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.enqueue(row.clone())?)
    }

    fn insert_if_absent(
        &mut self,
        row: &PersistedRow,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        self.enqueue(row.clone())?;
        Ok(true)
    }
}
