//! Two-way barrier for a library's artifact and native bundle.
//!
//! Each side reports exactly once, in any order. The library completes only
//! when both have reported. A side that can never report (its task ended
//! early) is recorded as abandoned when the last handle is dropped.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{OperationError, PersistenceError};
use crate::types::{LibraryOutcome, NativesOutcome, UnitOutcome};

struct JoinState {
    artifact: Option<UnitOutcome>,
    natives: Option<NativesOutcome>,
    done: Option<oneshot::Sender<LibraryOutcome>>,
}

pub(crate) struct LibraryJoin {
    name: String,
    state: Mutex<JoinState>,
}

impl LibraryJoin {
    pub(crate) fn new(name: impl Into<String>) -> (Self, oneshot::Receiver<LibraryOutcome>) {
        let (tx, rx) = oneshot::channel();
        let join = Self {
            name: name.into(),
            state: Mutex::new(JoinState {
                artifact: None,
                natives: None,
                done: Some(tx),
            }),
        };
        (join, rx)
    }

    fn lock_state(&self) -> MutexGuard<'_, JoinState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn artifact_done(&self, outcome: UnitOutcome) {
        let mut state = self.lock_state();
        if state.artifact.is_some() {
            debug!(library = %self.name, "artifact side reported twice");
            return;
        }
        state.artifact = Some(outcome);
        self.try_close(&mut state);
    }

    pub(crate) fn natives_done(&self, outcome: NativesOutcome) {
        let mut state = self.lock_state();
        if state.natives.is_some() {
            debug!(library = %self.name, "natives side reported twice");
            return;
        }
        state.natives = Some(outcome);
        self.try_close(&mut state);
    }

    fn try_close(&self, state: &mut JoinState) {
        let (Some(artifact), Some(natives)) = (&state.artifact, &state.natives) else {
            return;
        };
        let outcome = LibraryOutcome {
            name: self.name.clone(),
            artifact: artifact.clone(),
            natives: natives.clone(),
        };
        if let Some(tx) = state.done.take() {
            // Receiver gone means nobody waits on this library
            let _ = tx.send(outcome);
        }
    }
}

impl Drop for LibraryJoin {
    fn drop(&mut self) {
        let name = self.name.clone();
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = state.done.take() else {
            return;
        };
        let abandoned = || -> OperationError {
            PersistenceError::Abandoned { name: name.clone() }.into()
        };
        let _ = tx.send(LibraryOutcome {
            name: name.clone(),
            artifact: state
                .artifact
                .take()
                .unwrap_or_else(|| UnitOutcome::Failed(abandoned())),
            natives: state
                .natives
                .take()
                .unwrap_or_else(|| NativesOutcome::Failed(abandoned())),
        });
    }
}
