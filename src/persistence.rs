//! Debounced write-back of the availability grid.
//!
//! Every toggle hands the controller a fresh snapshot. The controller keeps
//! at most one pending write: scheduling a new snapshot cancels the armed
//! timer and re-arms it with the full delay, so only the latest snapshot is
//! ever persisted. A forced flush (page hidden, session closed) writes the
//! pending snapshot right away and disarms the timer.
//!
//! Writes never overlap. A forced flush first waits for a write that is
//! already in flight, so returning from it means everything scheduled so
//! far has reached the store or failed.
//!
//! A write overwrites the slot list of each date with a `PUT`. There is no
//! merge with other sessions: whichever flush lands last wins.
//!
//! A failed write is not retried automatically. The snapshot stays pending
//! without a timer, the status channel reports [`SaveStatus::Failed`], and
//! the next forced flush tries it again. A newer toggle supersedes it.

use crate::{
    availability::encode_slots,
    backend::{available_times_path, DocumentStore},
    error::{Result, ScheduleError},
    types::{DateSlotGrid, Grid},
};
use futures::future::join_all;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::{
    sync::{
        watch::{self, Sender},
        Mutex as WriteLock,
    },
    task::JoinHandle,
    time::sleep,
};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error, info, warn};

pub const DEFAULT_FLUSH_DELAY: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    /// Nothing waiting to be written.
    Idle,
    /// A snapshot is waiting for its timer.
    Pending,
    Flushing,
    Saved,
    /// The last write failed; the snapshot is still unsaved.
    Failed(String),
}

struct PendingWrite {
    snapshot: Grid,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

struct Shared<S: DocumentStore> {
    store: S,
    delay: Duration,
    pending: Mutex<Option<PendingWrite>>,
    /// Held for the whole of a write.
    writing: WriteLock<()>,
    generation: AtomicU64,
    flushes: AtomicU64,
    status: Sender<SaveStatus>,
}

pub struct PersistenceController<S: DocumentStore> {
    shared: Arc<Shared<S>>,
}

impl<S: DocumentStore> PersistenceController<S> {
    pub fn new(store: S, delay: Duration) -> Self {
        let (status, _) = watch::channel(SaveStatus::Idle);
        Self {
            shared: Arc::new(Shared {
                store,
                delay,
                pending: Mutex::new(None),
                writing: WriteLock::new(()),
                generation: AtomicU64::new(0),
                flushes: AtomicU64::new(0),
                status,
            }),
        }
    }

    pub fn delay(&self) -> Duration {
        self.shared.delay
    }

    /// Arms the timer for `snapshot`, cancelling any timer already armed.
    pub fn schedule(&self, snapshot: Grid) {
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut pending = self.shared.pending.lock().unwrap();

        if let Some(previous) = pending.take() {
            if let Some(timer) = previous.timer {
                timer.abort();
            }
            debug!(generation, "Re-arming flush timer");
        } else {
            debug!(generation, "Arming flush timer");
        }

        let shared = self.shared.clone();
        let timer = tokio::spawn(async move {
            sleep(shared.delay).await;
            shared.fire(generation).await;
        });

        *pending = Some(PendingWrite {
            snapshot,
            generation,
            timer: Some(timer),
        });
        self.shared.publish(SaveStatus::Pending);
    }

    /// Disarms the timer and drops the pending snapshot without writing it.
    pub fn cancel_pending(&self) -> bool {
        match self.shared.take_pending() {
            Some(_) => {
                info!("Discarded pending schedule changes");
                self.shared.publish(SaveStatus::Idle);
                true
            }
            None => false,
        }
    }

    /// Writes the pending snapshot now. Returns whether anything was written.
    pub async fn flush_now(&self) -> Result<bool> {
        self.shared.flush_pending().await
    }

    /// The host is about to discard the page.
    pub async fn page_hidden(&self) -> Result<bool> {
        info!("Page hidden, flushing schedule changes");
        self.flush_now().await
    }

    /// Flushes and consumes the controller.
    pub async fn shutdown(self) -> Result<bool> {
        self.flush_now().await
    }

    pub fn has_pending(&self) -> bool {
        self.shared.pending.lock().unwrap().is_some()
    }

    /// Number of armed timers, never more than one.
    pub fn armed_timers(&self) -> usize {
        let pending = self.shared.pending.lock().unwrap();
        pending
            .iter()
            .filter(|write| write.timer.as_ref().is_some_and(|timer| !timer.is_finished()))
            .count()
    }

    pub fn flush_count(&self) -> u64 {
        self.shared.flushes.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> SaveStatus {
        self.shared.status.borrow().clone()
    }

    pub fn status_stream(&self) -> WatchStream<SaveStatus> {
        WatchStream::new(self.shared.status.subscribe())
    }
}

impl<S: DocumentStore> Drop for PersistenceController<S> {
    fn drop(&mut self) {
        if !self.has_pending() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!("Schedule controller dropped with unsaved changes, flushing in background");
                let shared = self.shared.clone();
                handle.spawn(async move {
                    let _ = shared.flush_pending().await;
                });
            }
            Err(_) => error!("Schedule controller dropped outside a runtime, unsaved changes lost"),
        }
    }
}

impl<S: DocumentStore> Shared<S> {
    fn publish(&self, status: SaveStatus) {
        self.status.send_replace(status);
    }

    fn take_pending(&self) -> Option<Grid> {
        let write = self.pending.lock().unwrap().take()?;
        if let Some(timer) = write.timer {
            timer.abort();
        }
        Some(write.snapshot)
    }

    async fn fire(&self, generation: u64) {
        let _writing = self.writing.lock().await;
        let snapshot = {
            let mut pending = self.pending.lock().unwrap();
            let current = pending
                .as_ref()
                .is_some_and(|write| write.generation == generation);
            // A forced flush or a newer schedule already claimed the slot.
            if current {
                pending.take().map(|write| write.snapshot)
            } else {
                None
            }
        };
        if let Some(snapshot) = snapshot {
            info!(generation, "Flush timer elapsed");
            let _ = self.write_or_keep(snapshot, generation).await;
        }
    }

    /// Waits for a write in flight, then writes whatever is still pending.
    async fn flush_pending(&self) -> Result<bool> {
        let _writing = self.writing.lock().await;
        let write = self.pending.lock().unwrap().take();
        let Some(write) = write else {
            return Ok(false);
        };
        if let Some(timer) = write.timer {
            timer.abort();
        }
        self.write_or_keep(write.snapshot, write.generation).await?;
        Ok(true)
    }

    /// Writes `snapshot`; on failure puts it back unless something newer
    /// was scheduled meanwhile.
    async fn write_or_keep(&self, snapshot: Grid, generation: u64) -> Result<()> {
        let result = self.write(snapshot.clone()).await;
        if result.is_err() {
            let mut pending = self.pending.lock().unwrap();
            if pending.is_none() {
                *pending = Some(PendingWrite {
                    snapshot,
                    generation,
                    timer: None,
                });
            }
        }
        result
    }

    async fn write(&self, snapshot: Grid) -> Result<()> {
        self.publish(SaveStatus::Flushing);
        self.flushes.fetch_add(1, Ordering::SeqCst);

        let writes = snapshot.iter().map(|day| self.write_date(day));
        let failure: Option<ScheduleError> = join_all(writes)
            .await
            .into_iter()
            .find_map(|result| result.err());

        match failure {
            None => {
                info!(dates = snapshot.len(), "Saved available times");
                // toggles made while the write was in flight are still pending
                let rescheduled = self.pending.lock().unwrap().is_some();
                self.publish(match rescheduled {
                    true => SaveStatus::Pending,
                    false => SaveStatus::Saved,
                });
                Ok(())
            }
            Some(err) => {
                self.publish(SaveStatus::Failed(err.to_string()));
                Err(err)
            }
        }
    }

    async fn write_date(&self, day: &DateSlotGrid) -> Result<()> {
        let slots = encode_slots(&day.slots)?;
        let result = self
            .store
            .put(&available_times_path(&day.date), slots)
            .await;
        if let Err(err) = &result {
            error!(?err, date = %day.date, "Failed to save available times");
        }
        result
    }
}
