//! Invocation surface: the three trigger points an outer transport calls.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use pokefetch_remote::RemoteClient;
use pokefetch_shared::{EnrichConfig, FetchConfig, Record, Result, WorkRange};
use pokefetch_storage::{RecordSink, RecordStore};

use crate::fetcher::FetchPool;
use crate::progress::ProgressReporter;
use crate::refresher::{RefreshSummary, Refresher};

/// Summary of a completed fetch-and-persist run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSummary {
    pub range: WorkRange,
    /// Records written to the store.
    pub written: usize,
    pub elapsed: Duration,
}

/// Wires the fetch pool, the enrichment stage and both persistence
/// boundaries together.
pub struct Service<C, S, K> {
    pool: FetchPool<C>,
    refresher: Refresher<C, S, K>,
    store: Arc<S>,
    sink: Arc<K>,
}

impl<C, S, K> Service<C, S, K>
where
    C: RemoteClient + 'static,
    S: RecordStore,
    K: RecordSink,
{
    pub fn new(client: C, store: S, sink: K, fetch: FetchConfig, enrich: EnrichConfig) -> Self {
        let client = Arc::new(client);
        let store = Arc::new(store);
        let sink = Arc::new(sink);

        Self {
            pool: FetchPool::new(Arc::clone(&client), fetch),
            refresher: Refresher::new(client, Arc::clone(&store), Arc::clone(&sink), enrich),
            store,
            sink,
        }
    }

    /// Fetch `[from, to]` and replace the stored record set with the result.
    /// Nothing is written unless every lookup succeeded.
    pub async fn trigger_fetch(
        &self,
        from: i64,
        to: i64,
        progress: &dyn ProgressReporter,
    ) -> Result<FetchSummary> {
        self.trigger_fetch_with_cancel(from, to, &CancellationToken::new(), progress)
            .await
    }

    #[instrument(skip(self, cancel, progress))]
    pub async fn trigger_fetch_with_cancel(
        &self,
        from: i64,
        to: i64,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> Result<FetchSummary> {
        let start = Instant::now();
        let range = WorkRange::new(from, to)?;

        let records = self
            .pool
            .fetch_range_with_cancel(range, cancel, progress)
            .await?;

        progress.phase("Writing record store");
        self.store.write(&records).await?;

        let summary = FetchSummary {
            range,
            written: records.len(),
            elapsed: start.elapsed(),
        };
        info!(
            written = summary.written,
            elapsed_ms = summary.elapsed.as_millis(),
            "fetch persisted"
        );
        Ok(summary)
    }

    /// Re-read the store, enrich every record and save to the sink.
    pub async fn trigger_refresh(&self, progress: &dyn ProgressReporter) -> Result<RefreshSummary> {
        self.refresher.refresh(progress).await
    }

    pub async fn trigger_refresh_with_cancel(
        &self,
        cancel: &CancellationToken,
        progress: &dyn ProgressReporter,
    ) -> Result<RefreshSummary> {
        self.refresher.refresh_with_cancel(cancel, progress).await
    }

    /// Every enriched record currently in the sink.
    pub async fn list_records(&self) -> Result<Vec<Record>> {
        self.sink.list().await
    }
}
