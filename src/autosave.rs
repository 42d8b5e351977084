//! Debounced background saving of the canvas script.
//!
//! Every local edit re-arms a countdown. When the canvas has been quiet for the whole
//! interval, the latest snapshot is written with a single PATCH. Failed saves are not retried;
//! the canvas simply stays marked unsaved until the next edit or an explicit save.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::task::JoinHandle;

use crate::error::{NetworkError, Notice};
use crate::store::CanvasStore;

pub const DEFAULT_QUIET_INTERVAL: Duration = Duration::from_millis(2000);

/// Save bookkeeping shown next to the canvas name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveStatus {
    /// Local changes exist that the backend has not confirmed.
    pub dirty: bool,
    /// Number of saves currently in flight.
    pub saving: usize,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Bumped on every scheduled or explicit save. Only the newest revision may clear `dirty`.
    pub revision: u64,
}

pub struct Autosaver<S: CanvasStore + 'static> {
    store: Arc<S>,
    owner: String,
    canvas_id: String,
    quiet: Duration,
    status: Arc<Mutex<SaveStatus>>,
    notices: Arc<Mutex<Vec<Notice>>>,
    pending: Option<JoinHandle<()>>,
}

impl<S: CanvasStore + 'static> Autosaver<S> {
    pub fn new(
        store: Arc<S>,
        owner: impl Into<String>,
        canvas_id: impl Into<String>,
        quiet: Duration,
    ) -> Self {
        Autosaver {
            store,
            owner: owner.into(),
            canvas_id: canvas_id.into(),
            quiet,
            status: Arc::new(Mutex::new(SaveStatus::default())),
            notices: Arc::new(Mutex::new(Vec::new())),
            pending: None,
        }
    }

    pub fn quiet_interval(&self) -> Duration {
        self.quiet
    }

    /// Restarts the countdown with `snapshot` as the content to save.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&mut self, snapshot: impl Into<String>) {
        self.cancel();
        let revision = self.bump_revision();
        let job = self.job();
        let snapshot = snapshot.into();
        let quiet = self.quiet;
        debug!(
            "autosave of canvas {} armed for revision {} in {:?}",
            self.canvas_id, revision, quiet
        );
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            // The write runs detached so a later edit can only cancel countdowns,
            // never a save that already started.
            tokio::spawn(async move {
                let _ = job.run(revision, snapshot).await;
            });
        }));
    }

    /// Cancels the countdown and writes `snapshot` right away.
    pub async fn save_now(
        &mut self,
        snapshot: impl Into<String>,
    ) -> Result<DateTime<Utc>, NetworkError> {
        self.cancel();
        let revision = self.bump_revision();
        self.job().run(revision, snapshot.into()).await
    }

    /// Drops a pending countdown. Saves already in flight are unaffected.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Marks the canvas clean without saving, after it was replaced from the backend.
    pub fn reset(&mut self) {
        self.cancel();
        let mut status = lock(&self.status);
        status.revision += 1;
        status.dirty = false;
    }

    pub fn is_armed(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn status(&self) -> SaveStatus {
        lock(&self.status).clone()
    }

    /// Notices produced by failed saves since the last call.
    pub fn take_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut *lock(&self.notices))
    }

    fn bump_revision(&self) -> u64 {
        let mut status = lock(&self.status);
        status.revision += 1;
        status.dirty = true;
        status.revision
    }

    fn job(&self) -> SaveJob<S> {
        SaveJob {
            store: Arc::clone(&self.store),
            owner: self.owner.clone(),
            canvas_id: self.canvas_id.clone(),
            status: Arc::clone(&self.status),
            notices: Arc::clone(&self.notices),
        }
    }
}

impl<S: CanvasStore + 'static> Drop for Autosaver<S> {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct SaveJob<S> {
    store: Arc<S>,
    owner: String,
    canvas_id: String,
    status: Arc<Mutex<SaveStatus>>,
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl<S: CanvasStore> SaveJob<S> {
    async fn run(&self, revision: u64, snapshot: String) -> Result<DateTime<Utc>, NetworkError> {
        lock(&self.status).saving += 1;
        let result = self
            .store
            .save_script(&self.owner, &self.canvas_id, &snapshot)
            .await;

        let mut status = lock(&self.status);
        status.saving = status.saving.saturating_sub(1);
        match &result {
            Ok(saved_at) => {
                if status.revision == revision {
                    status.dirty = false;
                }
                status.last_saved_at = Some(*saved_at);
                status.last_error = None;
                info!(
                    "saved canvas {} (revision {}, {} bytes)",
                    self.canvas_id,
                    revision,
                    snapshot.len()
                );
            }
            Err(err) => {
                status.last_error = Some(err.to_string());
                warn!("failed to save canvas {}: {}", self.canvas_id, err);
                lock(&self.notices).push(Notice::error(format!("Failed to save canvas: {}", err)));
            }
        }
        result
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
