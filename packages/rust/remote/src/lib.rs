//! Remote resource API boundary.
//!
//! This crate provides:
//! - [`RemoteClient`] - the two single-attempt lookups the pipeline consumes
//! - [`PokeApiClient`] - a `reqwest`-backed implementation against PokeAPI

pub mod client;

use async_trait::async_trait;
use pokefetch_shared::{RawRecord, Result};

pub use client::{PokeApiClient, SubResource};

/// One lookup per call, no batching, no retries.
///
/// Implementations must be shareable across worker tasks.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Fetch the primary record for `id`.
    async fn fetch_primary(&self, id: i64) -> Result<RawRecord>;

    /// Fetch the sub-resource at `uri` and return its description strings
    /// in source order.
    async fn fetch_secondary(&self, uri: &str) -> Result<Vec<String>>;
}

#[async_trait]
impl<T: RemoteClient + ?Sized> RemoteClient for std::sync::Arc<T> {
    async fn fetch_primary(&self, id: i64) -> Result<RawRecord> {
        (**self).fetch_primary(id).await
    }

    async fn fetch_secondary(&self, uri: &str) -> Result<Vec<String>> {
        (**self).fetch_secondary(uri).await
    }
}
