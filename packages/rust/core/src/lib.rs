//! Core pipeline orchestration for pokefetch.
//!
//! Stage 1 ([`fetcher`]) fetches an ID range through a bounded worker pool
//! and persists it all-or-nothing. Stage 2 ([`refresher`]) re-reads the
//! stored set, enriches each record from its reference URIs and saves the
//! results. [`service`] exposes both as trigger points.

pub mod coordination;
pub mod fetcher;
pub mod progress;
mod range;
pub mod refresher;
pub mod service;

#[cfg(test)]
mod testing;

pub use coordination::Envelope;
pub use fetcher::FetchPool;
pub use progress::{ProgressReporter, SilentProgress};
pub use refresher::{RefreshSummary, Refresher};
pub use service::{FetchSummary, Service};

pub use tokio_util::sync::CancellationToken;
