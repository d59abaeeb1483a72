//! Persistence boundaries for pokefetch.
//!
//! - [`RecordStore`] / [`CsvStore`]: bulk whole-set read and write of the
//!   stage 1 record set in a flat CSV file.
//! - [`RecordSink`] / [`Cache`]: key-value upsert of enriched records into a
//!   libSQL database, plus bulk read for listing.

mod cache;
mod csv_store;
mod migrations;

use async_trait::async_trait;
use pokefetch_shared::{Record, Result};

pub use cache::Cache;
pub use csv_store::CsvStore;

/// Durable store holding the full flat record set.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Atomically replace the persisted set with `records`.
    async fn write(&self, records: &[Record]) -> Result<()>;

    /// Return the full current set. Fails if the store is absent or corrupt.
    async fn read(&self) -> Result<Vec<Record>>;
}

/// Cache of enriched records keyed by record ID.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Upsert every record by ID. An empty slice is a successful no-op.
    async fn save(&self, records: &[Record]) -> Result<()>;

    /// Every cached record, ordered by ID.
    async fn list(&self) -> Result<Vec<Record>>;
}

#[async_trait]
impl<T: RecordStore + ?Sized> RecordStore for std::sync::Arc<T> {
    async fn write(&self, records: &[Record]) -> Result<()> {
        (**self).write(records).await
    }

    async fn read(&self) -> Result<Vec<Record>> {
        (**self).read().await
    }
}

#[async_trait]
impl<T: RecordSink + ?Sized> RecordSink for std::sync::Arc<T> {
    async fn save(&self, records: &[Record]) -> Result<()> {
        (**self).save(records).await
    }

    async fn list(&self) -> Result<Vec<Record>> {
        (**self).list().await
    }
}
