//! Cancellation and result-aggregation scaffolding shared by both stages.
//!
//! Workers only ever talk to the coordinating task through channels. Every
//! blocking point a worker has (queue receive, remote call, output send) goes
//! through one of the helpers here so that a cancelled run drains and exits
//! instead of leaving tasks parked on a channel.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use pokefetch_shared::{PokefetchError, Result};

/// Outcome of one unit of work, tagged with the record ID it belongs to.
#[derive(Debug)]
pub struct Envelope<T> {
    pub id: i64,
    pub outcome: Result<T>,
}

/// Multi-consumer view over a bounded channel. Workers pull from it; the
/// dispatcher is the only producer.
pub(crate) struct WorkQueue<T> {
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}

impl<T> WorkQueue<T> {
    pub(crate) fn new(rx: mpsc::Receiver<T>) -> Self {
        Self {
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Next unit of work, or `None` once the queue is drained or the run is
    /// cancelled.
    pub(crate) async fn next(&self, token: &CancellationToken) -> Option<T> {
        tokio::select! {
            biased;
            _ = token.cancelled() => None,
            mut rx = self.rx.lock() => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => None,
                    item = rx.recv() => item,
                }
            }
        }
    }
}

/// Run `fut` unless the run is cancelled first. `None` means cancelled; the
/// future is dropped, which aborts an in-flight request.
pub(crate) async fn guarded<F: Future>(token: &CancellationToken, fut: F) -> Option<F::Output> {
    if token.is_cancelled() {
        return None;
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        out = fut => Some(out),
    }
}

/// Send `item` downstream, racing the cancellation signal. Returns `false`
/// when the item was not delivered and the caller should stop.
pub(crate) async fn emit<T>(tx: &mpsc::Sender<T>, token: &CancellationToken, item: T) -> bool {
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        sent = tx.send(item) => sent.is_ok(),
    }
}

/// First-error latch owned by the coordinating task.
#[derive(Debug, Default)]
pub(crate) struct FailureLatch {
    first: Option<PokefetchError>,
    failures: usize,
}

impl FailureLatch {
    /// Record a failure. Returns `true` only for the first one.
    pub(crate) fn record(&mut self, err: PokefetchError) -> bool {
        self.failures += 1;
        if self.first.is_some() {
            return false;
        }
        warn!(error = %err, "first failure observed");
        self.first = Some(err);
        true
    }

    pub(crate) fn failures(&self) -> usize {
        self.failures
    }

    pub(crate) fn is_tripped(&self) -> bool {
        self.first.is_some()
    }

    pub(crate) fn take(&mut self) -> Option<PokefetchError> {
        self.first.take()
    }
}

/// Wait for every task in `tasks`; a panicked worker counts as a failure.
pub(crate) async fn join_all(tasks: &mut JoinSet<()>, latch: &mut FailureLatch) {
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            if e.is_panic() {
                latch.record(PokefetchError::Worker(e.to_string()));
            }
        }
    }
}
