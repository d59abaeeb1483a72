//! In-memory doubles for the remote client, record store and sink.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use pokefetch_remote::RemoteClient;
use pokefetch_shared::{AbilitySlot, NamedResource, PokefetchError, RawRecord, Record, Result};
use pokefetch_storage::{RecordSink, RecordStore};

/// Decrements the in-flight gauge when the call ends or is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Spy client: counts calls, tracks the in-flight high-water mark, and fails
/// on configured IDs or URIs.
#[derive(Default)]
pub(crate) struct MockRemote {
    fail_ids: HashSet<i64>,
    fail_uris: HashSet<String>,
    delay: Duration,
    uris_per_record: usize,
    pub primary_calls: AtomicUsize,
    pub secondary_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockRemote {
    pub(crate) fn new() -> Self {
        Self {
            uris_per_record: 2,
            ..Default::default()
        }
    }

    pub(crate) fn failing_ids(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.fail_ids.extend(ids);
        self
    }

    pub(crate) fn failing_uris(mut self, uris: impl IntoIterator<Item = String>) -> Self {
        self.fail_uris.extend(uris);
        self
    }

    /// Latency of every successful call. Failing calls return at once.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn with_uris_per_record(mut self, n: usize) -> Self {
        self.uris_per_record = n;
        self
    }

    pub(crate) fn uri_for(id: i64, n: usize) -> String {
        format!("https://remote.test/ability/{id}-{n}/")
    }

    pub(crate) fn primary_calls(&self) -> usize {
        self.primary_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn secondary_calls(&self) -> usize {
        self.secondary_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(&self.in_flight)
    }

    async fn pause(&self, failing: bool) {
        let delay = if failing { Duration::ZERO } else { self.delay };
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl RemoteClient for MockRemote {
    async fn fetch_primary(&self, id: i64) -> Result<RawRecord> {
        self.primary_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = self.enter();
        let failing = self.fail_ids.contains(&id);
        self.pause(failing).await;

        if failing {
            return Err(PokefetchError::upstream_id(id, "HTTP 500 Internal Server Error"));
        }

        let abilities = (0..self.uris_per_record)
            .map(|n| AbilitySlot {
                ability: NamedResource {
                    name: format!("ability-{n}"),
                    url: Self::uri_for(id, n),
                },
            })
            .collect();

        Ok(RawRecord {
            id,
            name: format!("mon-{id}"),
            height: id.wrapping_mul(2),
            weight: id.wrapping_mul(10),
            abilities,
        })
    }

    async fn fetch_secondary(&self, uri: &str) -> Result<Vec<String>> {
        self.secondary_calls.fetch_add(1, Ordering::SeqCst);
        let _guard = self.enter();
        let failing = self.fail_uris.contains(uri);
        self.pause(failing).await;

        if failing {
            return Err(PokefetchError::upstream_uri(uri, "HTTP 503 Service Unavailable"));
        }
        Ok(vec![format!("{uri}#effect"), format!("{uri}#short")])
    }
}

/// Records as stage 1 would have persisted them for IDs `1..=n`.
pub(crate) fn seed_records(n: i64, uris_per_record: usize) -> Vec<Record> {
    (1..=n)
        .map(|id| Record {
            id,
            name: format!("mon-{id}"),
            height: id * 2,
            weight: id * 10,
            reference_uris: (0..uris_per_record)
                .map(|k| MockRemote::uri_for(id, k))
                .collect(),
            effect_entries: Vec::new(),
        })
        .collect()
}

/// In-memory [`RecordStore`] that counts writes.
#[derive(Default)]
pub(crate) struct MemoryStore {
    records: Mutex<Option<Vec<Record>>>,
    writes: AtomicUsize,
    fail_writes: bool,
}

impl MemoryStore {
    pub(crate) fn with_records(records: Vec<Record>) -> Self {
        Self {
            records: Mutex::new(Some(records)),
            ..Default::default()
        }
    }

    /// A store whose writes always fail and leave it untouched.
    pub(crate) fn read_only() -> Self {
        Self {
            fail_writes: true,
            ..Default::default()
        }
    }

    /// A store with nothing persisted yet; reads fail.
    pub(crate) fn absent() -> Self {
        Self::default()
    }

    pub(crate) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub(crate) fn snapshot(&self) -> Option<Vec<Record>> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn write(&self, records: &[Record]) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(PokefetchError::StoreWrite("disk full".into()));
        }
        *self.records.lock().unwrap() = Some(records.to_vec());
        Ok(())
    }

    async fn read(&self) -> Result<Vec<Record>> {
        self.records
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| PokefetchError::StoreRead("no record set persisted".into()))
    }
}

/// In-memory [`RecordSink`] that keeps every `save` call it receives.
#[derive(Default)]
pub(crate) struct MemorySink {
    saves: Mutex<Vec<Vec<Record>>>,
    fail: bool,
}

impl MemorySink {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub(crate) fn saves(&self) -> Vec<Vec<Record>> {
        self.saves.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn save(&self, records: &[Record]) -> Result<()> {
        self.saves.lock().unwrap().push(records.to_vec());
        if self.fail {
            return Err(PokefetchError::SinkWrite("cache unavailable".into()));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Record>> {
        let mut latest = std::collections::BTreeMap::new();
        for save in self.saves.lock().unwrap().iter() {
            for record in save {
                latest.insert(record.id, record.clone());
            }
        }
        Ok(latest.into_values().collect())
    }
}
