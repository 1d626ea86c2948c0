//! Admission-controlled download queue.
//!
//! Requests are dispatched in FIFO order but complete in whatever order the
//! transport returns them. At most `max_concurrency` transport calls are in
//! flight at any instant:
//!
//! ```text
//! enqueued >= dispatched >= completed
//! dispatched - completed <= max_concurrency
//! ```
//!
//! A failed transport call still counts as completed and frees its slot, so a
//! single failure cannot stall the queue.
//!
//! Whenever every enqueued request has completed the queue is *drained*; the
//! drain hook runs once per transition from busy to drained. The queue is
//! reused across batches, so a later `get` re-arms it.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::sync::{oneshot, watch};
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::transport::Transport;

/// Result delivered to a request's completion
pub type FetchResult = std::result::Result<Bytes, TransportError>;

type CompletionFn = Box<dyn FnOnce(FetchResult) + Send + 'static>;
type DrainFn = Arc<dyn Fn() + Send + Sync + 'static>;

/// A queued request, consumed exactly once by the dispatch step
struct FetchRequest {
    url: String,
    on_complete: CompletionFn,
}

struct FetcherState {
    /// Enqueued but not yet dispatched, in FIFO order
    pending: VecDeque<FetchRequest>,
    enqueued: usize,
    dispatched: usize,
    completed: usize,
    drained: bool,
    /// Drain events decided so far; published through `drain_tx` after the hook runs
    drain_events: u64,
    on_drain: Option<DrainFn>,
}

impl FetcherState {
    fn in_flight(&self) -> usize {
        self.dispatched - self.completed
    }
}

struct FetcherInner {
    transport: Arc<dyn Transport>,
    max_concurrency: usize,
    state: Mutex<FetcherState>,
    /// Number of drain events whose hook has finished
    drain_tx: watch::Sender<u64>,
}

/// Snapshot of queue counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FetcherStats {
    /// Requests ever enqueued
    pub enqueued: usize,
    /// Requests handed to the transport
    pub dispatched: usize,
    /// Requests whose transport call finished (success or failure)
    pub completed: usize,
}

impl FetcherStats {
    /// Transport calls currently in flight
    pub fn in_flight(&self) -> usize {
        self.dispatched - self.completed
    }
}

/// Shared, cloneable handle to the download queue
#[derive(Clone)]
pub struct Fetcher {
    inner: Arc<FetcherInner>,
}

impl Fetcher {
    /// Create a queue over `transport` allowing `max_concurrency` calls in flight.
    ///
    /// A cap of zero is treated as one.
    pub fn new(transport: Arc<dyn Transport>, max_concurrency: usize) -> Self {
        let (drain_tx, _rx) = watch::channel(0);
        Self {
            inner: Arc::new(FetcherInner {
                transport,
                max_concurrency: max_concurrency.max(1),
                state: Mutex::new(FetcherState {
                    pending: VecDeque::new(),
                    enqueued: 0,
                    dispatched: 0,
                    completed: 0,
                    drained: true,
                    drain_events: 0,
                    on_drain: None,
                }),
                drain_tx,
            }),
        }
    }

    /// Configured concurrency cap
    pub fn max_concurrency(&self) -> usize {
        self.inner.max_concurrency
    }

    /// Enqueue `url` and return a handle resolving to its body
    pub fn get(&self, url: impl Into<String>) -> FetchHandle {
        let url = url.into();
        let (tx, rx) = oneshot::channel();
        self.get_with(url.clone(), move |result| {
            // Receiver may have been dropped; the result is simply discarded then
            let _ = tx.send(result);
        });
        FetchHandle { url, rx }
    }

    /// Enqueue `url`; `on_complete` runs once with the body or the failure.
    ///
    /// Returns immediately. The callback runs on a runtime worker and must not
    /// block.
    pub fn get_with<F>(&self, url: impl Into<String>, on_complete: F)
    where
        F: FnOnce(FetchResult) + Send + 'static,
    {
        let url = url.into();
        {
            let mut state = self.inner.lock_state();
            state.enqueued += 1;
            state.drained = false;
            state.pending.push_back(FetchRequest {
                url: url.clone(),
                on_complete: Box::new(on_complete),
            });
        }
        debug!(url = %url, "fetch enqueued");
        FetcherInner::advance(&self.inner);
    }

    /// Replace the drain hook. Only the most recent hook runs on the next drain.
    pub fn set_on_drain<F>(&self, on_drain: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.lock_state().on_drain = Some(Arc::new(on_drain));
    }

    /// Remove the drain hook
    pub fn clear_on_drain(&self) {
        self.inner.lock_state().on_drain = None;
    }

    /// Wait until the queue is drained.
    ///
    /// Returns immediately if nothing is pending or in flight.
    pub async fn wait_drained(&self) {
        let (mut rx, target) = {
            let state = self.inner.lock_state();
            let target = if state.drained {
                state.drain_events
            } else {
                state.drain_events + 1
            };
            // Subscribe while holding the lock so the next drain cannot be missed
            (self.inner.drain_tx.subscribe(), target)
        };
        // Sender lives as long as `self`, so this only errors if it is dropped
        let _ = rx.wait_for(|published| *published >= target).await;
    }

    /// Current queue counters
    pub fn stats(&self) -> FetcherStats {
        let state = self.inner.lock_state();
        FetcherStats {
            enqueued: state.enqueued,
            dispatched: state.dispatched,
            completed: state.completed,
        }
    }
}

impl FetcherInner {
    fn lock_state(&self) -> MutexGuard<'_, FetcherState> {
        // Critical sections never panic mid-update, so a poisoned lock still holds consistent counters
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admission step: dispatch while slots are free, then check for drain.
    fn advance(this: &Arc<Self>) {
        let (ready, drain_hook) = {
            let mut state = this.lock_state();
            let mut ready = Vec::new();
            while state.in_flight() < this.max_concurrency {
                let Some(request) = state.pending.pop_front() else {
                    break;
                };
                state.dispatched += 1;
                ready.push(request);
            }

            let mut drain_hook = None;
            if !state.drained && state.completed == state.enqueued {
                state.drained = true;
                state.drain_events += 1;
                drain_hook = Some((state.drain_events, state.on_drain.clone()));
            }
            (ready, drain_hook)
        };

        for request in ready {
            Self::dispatch(this, request);
        }

        if let Some((generation, hook)) = drain_hook {
            debug!(generation, "fetch queue drained");
            if let Some(hook) = hook {
                hook();
            }
            // Waiters observe the drain only after the hook has run
            this.drain_tx
                .send_modify(|published| *published = (*published).max(generation));
        }
    }

    fn dispatch(this: &Arc<Self>, request: FetchRequest) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            // Outside a runtime (e.g. during shutdown); the caller sees `Dropped`
            warn!(url = %request.url, "no runtime to dispatch fetch");
            this.lock_state().completed += 1;
            return;
        };
        let inner = Arc::clone(this);
        runtime.spawn(async move {
            let FetchRequest { url, on_complete } = request;
            let mut slot = SlotGuard {
                inner: Arc::clone(&inner),
                counted: false,
            };
            debug!(url = %url, "fetch dispatched");
            let result = Self::fetch_isolated(&inner, &url).await;
            if let Err(e) = &result {
                warn!(url = %url, error = %e, "fetch failed");
            }

            inner.lock_state().completed += 1;
            slot.counted = true;
            on_complete(result);
        });
    }

    /// Run the transport call in its own task so a panic becomes a failure
    async fn fetch_isolated(inner: &Arc<Self>, url: &str) -> FetchResult {
        let transport = Arc::clone(&inner.transport);
        let owned_url = url.to_string();
        match tokio::spawn(async move { transport.fetch(&owned_url).await }).await {
            Ok(result) => result,
            Err(e) => Err(TransportError::Request {
                url: url.to_string(),
                reason: format!("transport task failed: {}", e),
            }),
        }
    }
}

/// Frees a dispatched request's slot and advances the queue when its task
/// ends, including by panic or cancellation
struct SlotGuard {
    inner: Arc<FetcherInner>,
    counted: bool,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if !self.counted {
            self.inner.lock_state().completed += 1;
        }
        FetcherInner::advance(&self.inner);
    }
}

/// Completion handle for a single [`Fetcher::get`] call
pub struct FetchHandle {
    url: String,
    rx: oneshot::Receiver<FetchResult>,
}

impl FetchHandle {
    /// The requested URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Future for FetchHandle {
    type Output = FetchResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(TransportError::Dropped {
                url: self.url.clone(),
            })),
            Poll::Pending => Poll::Pending,
        }
    }
}
