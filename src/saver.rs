//! Batched, error-aggregating file writer.
//!
//! A [`FileSaver`] owns one batch under one root directory. Every operation is
//! counted before it starts; the batch completes exactly once, when the count
//! returns to zero, with the aggregated [`BatchResult`].
//!
//! Registering an operation and supplying its payload are separate steps:
//! [`FileSaver::reserve`] counts the operation and hands back a [`SaveSlot`],
//! and the data arrives later through [`SaveSlot::fulfill`]. This lets a caller
//! register every entry of an archive before extracting any of them.
//!
//! The batch is created holding one registration of its own. Nothing can
//! complete the batch until [`FileSaver::seal`] releases it, so operations
//! that finish while others are still being registered never drive the count
//! to zero early. A sealed batch with no operations completes immediately.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::{OperationError, PersistenceError};
use crate::persistence::{Persistence, resolve_under};
use crate::types::{BatchResult, WriteMode};

/// True for names denoting a directory rather than a file
pub fn is_directory_marker(name: &str) -> bool {
    name.ends_with('/')
}

struct SaverState {
    /// Registered operations not yet settled, plus the registration hold until sealed
    pending: usize,
    sealed: bool,
    result: BatchResult,
    completion: Option<oneshot::Sender<BatchResult>>,
}

struct SaverInner {
    root: PathBuf,
    persistence: Arc<dyn Persistence>,
    state: Mutex<SaverState>,
}

/// How a slot was settled
enum Settle {
    Saved,
    Skipped,
    Marker,
    Failed(OperationError),
}

impl SaverInner {
    fn lock_state(&self) -> MutexGuard<'_, SaverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Settle one registered operation and complete the batch on the last one
    fn done(&self, name: &str, settle: Settle) {
        let finished = {
            let mut state = self.lock_state();
            match settle {
                Settle::Saved => state.result.saved += 1,
                Settle::Skipped => state.result.skipped += 1,
                Settle::Marker => {}
                Settle::Failed(error) => state.result.record(name, error),
            }
            state.pending -= 1;
            Self::take_if_finished(&mut state)
        };
        self.complete(finished);
    }

    fn take_if_finished(
        state: &mut SaverState,
    ) -> Option<(oneshot::Sender<BatchResult>, BatchResult)> {
        if state.pending > 0 {
            return None;
        }
        let tx = state.completion.take()?;
        Some((tx, std::mem::take(&mut state.result)))
    }

    fn complete(&self, finished: Option<(oneshot::Sender<BatchResult>, BatchResult)>) {
        if let Some((tx, result)) = finished {
            info!(
                root = ?self.root,
                saved = result.saved,
                skipped = result.skipped,
                errors = result.errors.len(),
                "save batch complete"
            );
            // Nobody awaiting the batch is fine; the result is logged above
            let _ = tx.send(result);
        }
    }
}

impl Drop for SaverInner {
    fn drop(&mut self) {
        // Last handle gone without seal(): every slot has settled, so report what we have
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = state.completion.take() {
            debug!(root = ?self.root, "save batch dropped unsealed, completing");
            let _ = tx.send(std::mem::take(&mut state.result));
        }
    }
}

/// Cloneable handle to one save batch
#[derive(Clone)]
pub struct FileSaver {
    inner: Arc<SaverInner>,
}

impl FileSaver {
    /// Start a batch writing under `root`.
    ///
    /// The returned [`BatchCompletion`] resolves once the batch has been
    /// sealed and every registered operation has settled.
    pub fn new(
        root: impl Into<PathBuf>,
        persistence: Arc<dyn Persistence>,
    ) -> (Self, BatchCompletion) {
        let (tx, rx) = oneshot::channel();
        let saver = Self {
            inner: Arc::new(SaverInner {
                root: root.into(),
                persistence,
                state: Mutex::new(SaverState {
                    pending: 1,
                    sealed: false,
                    result: BatchResult::default(),
                    completion: Some(tx),
                }),
            }),
        };
        (saver, BatchCompletion { rx })
    }

    /// Destination root of this batch
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Operations registered and not yet settled
    pub fn pending(&self) -> usize {
        let state = self.inner.lock_state();
        state.pending - usize::from(!state.sealed)
    }

    /// Register an operation whose payload will be supplied later
    pub fn reserve(&self, name: impl Into<String>) -> SaveSlot {
        self.reserve_with_mode(name.into(), WriteMode::Regular)
    }

    /// As [`reserve`](Self::reserve), but the file is written executable
    pub fn reserve_executable(&self, name: impl Into<String>) -> SaveSlot {
        self.reserve_with_mode(name.into(), WriteMode::Executable)
    }

    fn reserve_with_mode(&self, name: String, mode: WriteMode) -> SaveSlot {
        {
            let mut state = self.inner.lock_state();
            state.pending += 1;
        }
        SaveSlot {
            inner: Arc::clone(&self.inner),
            name,
            mode,
            settled: false,
        }
    }

    /// Write `data` to `root/name` in the background.
    ///
    /// Directory markers are ignored: they are never counted and never written.
    pub fn save(&self, name: impl Into<String>, data: Bytes) {
        self.spawn_save(name.into(), data, WriteMode::Regular);
    }

    /// As [`save`](Self::save), but the file is written executable
    pub fn save_executable(&self, name: impl Into<String>, data: Bytes) {
        self.spawn_save(name.into(), data, WriteMode::Executable);
    }

    fn spawn_save(&self, name: String, data: Bytes, mode: WriteMode) {
        if is_directory_marker(&name) {
            return;
        }
        let slot = self.reserve_with_mode(name, mode);
        tokio::spawn(async move {
            // Outcome is recorded in the batch result
            let _ = slot.fulfill(data).await;
        });
    }

    /// Release the registration hold. Idempotent.
    ///
    /// Call once every operation of the batch has been registered.
    pub fn seal(&self) {
        let finished = {
            let mut state = self.inner.lock_state();
            if state.sealed {
                return;
            }
            state.sealed = true;
            state.pending -= 1;
            SaverInner::take_if_finished(&mut state)
        };
        self.inner.complete(finished);
    }
}

/// One registered save operation awaiting its payload.
///
/// Settle it with [`fulfill`](Self::fulfill), [`fail`](Self::fail) or
/// [`skip`](Self::skip). A slot dropped unsettled is recorded as
/// [`PersistenceError::Abandoned`].
#[must_use = "an unsettled slot is recorded as abandoned when dropped"]
pub struct SaveSlot {
    inner: Arc<SaverInner>,
    name: String,
    mode: WriteMode,
    settled: bool,
}

impl SaveSlot {
    /// Destination name relative to the batch root
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute destination path, or why the name is not acceptable
    pub fn destination(&self) -> Result<PathBuf, PersistenceError> {
        resolve_under(&self.inner.root, &self.name)
    }

    /// Write `data` and settle the slot.
    ///
    /// A directory marker settles without writing and never records an error.
    pub async fn fulfill(mut self, data: Bytes) -> Result<(), OperationError> {
        if is_directory_marker(&self.name) {
            self.settle(Settle::Marker);
            return Ok(());
        }

        let outcome = match self.destination() {
            Ok(path) => {
                self.inner
                    .persistence
                    .write_file(&path, data, self.mode)
                    .await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                debug!(name = %self.name, "saved");
                self.settle(Settle::Saved);
                Ok(())
            }
            Err(e) => {
                warn!(name = %self.name, error = %e, "save failed");
                let error = OperationError::from(e);
                self.settle(Settle::Failed(error.clone()));
                Err(error)
            }
        }
    }

    /// Settle the slot with a failure that happened before any write
    pub fn fail(mut self, error: impl Into<OperationError>) {
        let error = error.into();
        debug!(name = %self.name, error = %error, "save slot failed");
        self.settle(Settle::Failed(error));
    }

    /// Settle the slot without writing because the data is already present
    pub fn skip(mut self) {
        self.settle(Settle::Skipped);
    }

    fn settle(&mut self, settle: Settle) {
        self.settled = true;
        self.inner.done(&self.name, settle);
    }
}

impl Drop for SaveSlot {
    fn drop(&mut self) {
        if !self.settled {
            warn!(name = %self.name, "save slot dropped before being settled");
            let error = PersistenceError::Abandoned {
                name: self.name.clone(),
            };
            self.settle(Settle::Failed(error.into()));
        }
    }
}

/// Resolves to the aggregated result once the batch completes
pub struct BatchCompletion {
    rx: oneshot::Receiver<BatchResult>,
}

impl Future for BatchCompletion {
    type Output = BatchResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // The sender is consumed either on completion or when the batch is dropped
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or_default())
    }
}
