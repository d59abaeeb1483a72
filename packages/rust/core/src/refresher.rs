//! Stage 2: enrichment fan-out/fan-in.
//!
//! Reads the persisted record set, fans it out over a small fixed pool of
//! workers, and fans their output back into the coordinating task, which
//! alone owns the accumulated set and hands it to the sink.
//!
//! Each worker walks a record's reference URIs one at a time and replaces the
//! record's `effect_entries` with every description it got back. A record is
//! only emitted once all of its lookups succeeded. What a failure does to the
//! rest of the batch is decided by [`EnrichPolicy`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use pokefetch_remote::RemoteClient;
use pokefetch_shared::{EnrichConfig, EnrichPolicy, PokefetchError, Record, Result};
use pokefetch_storage::{RecordSink, RecordStore};

use crate::coordination::{Envelope, FailureLatch, WorkQueue, emit, guarded, join_all};
use crate::progress::ProgressReporter;
use crate::range::dispatch;

/// Summary of a completed refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Records read from the store.
    pub read: usize,
    /// Records enriched and handed to the sink.
    pub saved: usize,
    pub elapsed: Duration,
}

/// Where a single record ended up.
#[derive(Debug)]
enum EnrichStep {
    Enriched(Record),
    Failed(PokefetchError),
    /// Cancelled mid-record; nothing is emitted for it.
    Aborted,
}

/// Enrichment stage over a store, a sink and a [`RemoteClient`].
pub struct Refresher<C, S, K> {
    client: Arc<C>,
    store: Arc<S>,
    sink: Arc<K>,
    config: EnrichConfig,
}

impl<C, S, K> Refresher<C, S, K>
where
    C: RemoteClient + 'static,
    S: RecordStore,
    K: RecordSink,
{
    pub fn new(client: Arc<C>, store: Arc<S>, sink: Arc<K>, config: EnrichConfig) -> Self {
        Self {
            client,
            store,
            sink,
            config,
        }
    }

    pub fn workers(&self) -> usize {
        self.config.workers.max(1)
    }

    /// Enrich every stored record and save the results.
    ///
    /// Whatever was enriched is saved even when a lookup fails; the first
    /// lookup error is then returned after the save.
    pub async fn refresh(&self, progress: &dyn ProgressReporter) -> Result<RefreshSummary> {
        self.refresh_with_cancel(&CancellationToken::new(), progress)
            .await
    }

    /// Like [`refresh`](Self::refresh) but also stops when `cancel` fires.
    /// Records finished before that point are still saved.
    #[instrument(skip_all, fields(workers = self.workers(), policy = ?self.config.policy))]
    pub async fn refresh_with_cancel(
        &self,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> Result<RefreshSummary> {
        let start = Instant::now();

        progress.phase("Reading record store");
        let records = self.store.read().await?;
        let total = records.len();

        info!(total, "starting refresh");
        progress.phase("Enriching records");

        let (mut enriched, mut latch) = self.enrich_all(records, cancel, progress).await;
        enriched.sort_by_key(|r| r.id);

        progress.phase("Saving enriched records");
        if let Err(e) = self.sink.save(&enriched).await {
            if let Some(lookup_err) = latch.take() {
                warn!(error = %lookup_err, "lookup failure superseded by sink failure");
            }
            return Err(e);
        }

        info!(
            total,
            saved = enriched.len(),
            failures = latch.failures(),
            elapsed_ms = start.elapsed().as_millis(),
            "refresh finished"
        );

        if let Some(err) = latch.take() {
            return Err(err);
        }
        if cancel.is_cancelled() && enriched.len() != total {
            return Err(PokefetchError::Cancelled);
        }

        Ok(RefreshSummary {
            read: total,
            saved: enriched.len(),
            elapsed: start.elapsed(),
        })
    }

    /// Fan `records` out over the worker pool and collect what comes back.
    async fn enrich_all(
        &self,
        records: Vec<Record>,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> (Vec<Record>, FailureLatch) {
        let total = records.len();
        let mut latch = FailureLatch::default();
        if total == 0 {
            return (Vec::new(), latch);
        }

        let workers = self.workers().min(total);
        let policy = self.config.policy;
        let token = cancel.child_token();
        let _guard = token.clone().drop_guard();

        let (work_tx, work_rx) = mpsc::channel(workers);
        let (out_tx, mut out_rx) = mpsc::channel::<Envelope<Record>>(workers);
        let queue = WorkQueue::new(work_rx);

        let mut tasks = JoinSet::new();
        tasks.spawn({
            let token = token.clone();
            async move {
                dispatch(records, work_tx, token).await;
            }
        });
        for worker_id in 0..workers {
            tasks.spawn(enrich_worker(
                worker_id,
                Arc::clone(&self.client),
                queue.clone(),
                out_tx.clone(),
                token.clone(),
                policy,
            ));
        }
        drop(out_tx);

        let mut enriched = Vec::with_capacity(total);
        while let Some(envelope) = out_rx.recv().await {
            match envelope.outcome {
                Ok(record) => {
                    enriched.push(record);
                    progress.record_enriched(envelope.id, enriched.len(), total);
                }
                Err(e) => {
                    progress.record_failed(envelope.id, &e.to_string());
                    if latch.record(e) && policy == EnrichPolicy::AbortBatch {
                        token.cancel();
                    }
                }
            }
        }

        join_all(&mut tasks, &mut latch).await;
        (enriched, latch)
    }
}

/// Look up every reference URI of `record` in order and merge the results.
async fn enrich_record<C: RemoteClient>(
    client: &C,
    mut record: Record,
    token: &CancellationToken,
) -> EnrichStep {
    let mut effects = Vec::new();

    for uri in &record.reference_uris {
        match guarded(token, client.fetch_secondary(uri)).await {
            None => return EnrichStep::Aborted,
            Some(Err(e)) => return EnrichStep::Failed(e),
            Some(Ok(mut descriptions)) => effects.append(&mut descriptions),
        }
    }

    record.effect_entries = effects;
    EnrichStep::Enriched(record)
}

/// Idle -> fetching -> merging -> emitting -> idle, until the queue drains.
/// Exits without emitting the current record once aborted.
async fn enrich_worker<C: RemoteClient>(
    worker_id: usize,
    client: Arc<C>,
    queue: WorkQueue<Record>,
    tx: mpsc::Sender<Envelope<Record>>,
    token: CancellationToken,
    policy: EnrichPolicy,
) {
    trace!(worker_id, "enrich worker started");

    while let Some(record) = queue.next(&token).await {
        let id = record.id;
        match enrich_record(client.as_ref(), record, &token).await {
            EnrichStep::Enriched(record) => {
                debug!(worker_id, id, effects = record.effect_entries.len(), "record enriched");
                if !emit(&tx, &token, Envelope { id, outcome: Ok(record) }).await {
                    break;
                }
            }
            EnrichStep::Failed(e) => {
                if token.is_cancelled() {
                    break;
                }
                let delivered = emit(&tx, &token, Envelope { id, outcome: Err(e) }).await;
                if !delivered || policy == EnrichPolicy::AbortBatch {
                    break;
                }
            }
            EnrichStep::Aborted => {
                debug!(worker_id, id, "worker aborted by cancellation");
                break;
            }
        }
    }

    trace!(worker_id, "enrich worker stopped");
}
