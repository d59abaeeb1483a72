//! Stage 1: bounded concurrent fetch of an ID range.
//!
//! A dispatcher feeds IDs into a bounded queue; a fixed pool of workers pulls
//! from it, one primary lookup at a time each, so never more than
//! `FetchConfig::workers` lookups are in flight. Results travel back to the
//! coordinating task as [`Envelope`]s. The first failure cancels the run and
//! the whole batch is discarded.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace};

use pokefetch_remote::RemoteClient;
use pokefetch_shared::{FetchConfig, PokefetchError, Record, Result, WorkRange};

use crate::coordination::{Envelope, FailureLatch, WorkQueue, emit, guarded, join_all};
use crate::progress::ProgressReporter;
use crate::range::dispatch_range;

/// Bounded fetch pool over a [`RemoteClient`].
pub struct FetchPool<C> {
    client: Arc<C>,
    config: FetchConfig,
}

impl<C: RemoteClient + 'static> FetchPool<C> {
    pub fn new(client: Arc<C>, config: FetchConfig) -> Self {
        Self { client, config }
    }

    pub fn workers(&self) -> usize {
        self.config.workers.max(1)
    }

    /// Fetch every ID in `[from, to]`.
    ///
    /// Returns all records sorted by ID, or the first error. `from > to`
    /// fails with [`PokefetchError::InvalidRange`] before any lookup.
    pub async fn fetch_range(
        &self,
        from: i64,
        to: i64,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<Record>> {
        let range = WorkRange::new(from, to)?;
        self.fetch_range_with_cancel(range, &CancellationToken::new(), progress)
            .await
    }

    /// Like [`fetch_range`](Self::fetch_range) but also stops when `cancel`
    /// fires, returning [`PokefetchError::Cancelled`].
    #[instrument(skip_all, fields(range = %range, workers = self.workers()))]
    pub async fn fetch_range_with_cancel(
        &self,
        range: WorkRange,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> Result<Vec<Record>> {
        let start = Instant::now();
        let total = range.len();
        let workers = usize::try_from(total).map_or(self.workers(), |n| self.workers().min(n));
        let total_hint = usize::try_from(total).unwrap_or(usize::MAX);

        // Child token: tripping it never cancels the caller's token, and the
        // drop guard stops every worker if this future is dropped mid-run.
        let token = cancel.child_token();
        let _guard = token.clone().drop_guard();

        info!(total, workers, "starting fetch");
        progress.phase("Fetching records");

        let (work_tx, work_rx) = mpsc::channel(workers);
        let (out_tx, mut out_rx) = mpsc::channel::<Envelope<Record>>(workers);
        let queue = WorkQueue::new(work_rx);

        let mut tasks = JoinSet::new();
        tasks.spawn({
            let token = token.clone();
            async move {
                dispatch_range(range, work_tx, token).await;
            }
        });
        for worker_id in 0..workers {
            tasks.spawn(fetch_worker(
                worker_id,
                Arc::clone(&self.client),
                queue.clone(),
                out_tx.clone(),
                token.clone(),
            ));
        }
        drop(out_tx);

        // Grows with what actually arrives; the range may be far wider than
        // what a failing run ever collects.
        let mut records = Vec::new();
        let mut latch = FailureLatch::default();

        while let Some(envelope) = out_rx.recv().await {
            match envelope.outcome {
                Ok(record) => {
                    if latch.is_tripped() {
                        continue;
                    }
                    records.push(record);
                    progress.record_fetched(envelope.id, records.len(), total_hint);
                }
                Err(e) => {
                    progress.record_failed(envelope.id, &e.to_string());
                    if latch.record(e) {
                        token.cancel();
                    }
                }
            }
        }

        join_all(&mut tasks, &mut latch).await;

        if let Some(err) = latch.take() {
            info!(
                fetched = records.len(),
                failures = latch.failures(),
                elapsed_ms = start.elapsed().as_millis(),
                "fetch failed, discarding batch"
            );
            return Err(err);
        }
        if cancel.is_cancelled() || records.len() as u64 != total {
            return Err(PokefetchError::Cancelled);
        }

        records.sort_by_key(|r| r.id);

        info!(
            fetched = records.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "fetch completed"
        );
        Ok(records)
    }
}

/// Pull IDs until the queue drains or the run is cancelled.
async fn fetch_worker<C: RemoteClient>(
    worker_id: usize,
    client: Arc<C>,
    queue: WorkQueue<i64>,
    tx: mpsc::Sender<Envelope<Record>>,
    token: CancellationToken,
) {
    trace!(worker_id, "fetch worker started");

    while let Some(id) = queue.next(&token).await {
        let Some(result) = guarded(&token, client.fetch_primary(id)).await else {
            break;
        };

        let outcome = result.map(Record::from_raw);
        if outcome.is_err() && token.is_cancelled() {
            // Already failing; nothing new to report.
            break;
        }
        debug!(worker_id, id, ok = outcome.is_ok(), "lookup finished");

        if !emit(&tx, &token, Envelope { id, outcome }).await {
            break;
        }
    }

    trace!(worker_id, "fetch worker stopped");
}
