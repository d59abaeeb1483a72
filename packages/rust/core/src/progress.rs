//! Progress callbacks for pipeline runs.

/// Progress callback for reporting pipeline status.
///
/// Called only from the coordinating task, never from workers.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a primary record arrives during a fetch.
    fn record_fetched(&self, id: i64, current: usize, total: usize);
    /// Called when an enriched record arrives during a refresh.
    fn record_enriched(&self, id: i64, current: usize, total: usize);
    /// Called when a unit of work fails.
    fn record_failed(&self, id: i64, error: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn record_fetched(&self, _id: i64, _current: usize, _total: usize) {}
    fn record_enriched(&self, _id: i64, _current: usize, _total: usize) {}
    fn record_failed(&self, _id: i64, _error: &str) {}
}
