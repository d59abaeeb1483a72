//! Work dispatch: turns an ID range (or a record set) into a stream of work
//! items on a bounded queue.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use pokefetch_shared::WorkRange;

use crate::coordination::emit;

/// Feed every item into `tx` in order. Stops early on cancellation or when
/// every consumer has gone away. Returns how many items were dispatched.
///
/// Dropping `tx` on return closes the queue, which is how workers learn there
/// is no more work.
pub(crate) async fn dispatch<I>(items: I, tx: mpsc::Sender<I::Item>, token: CancellationToken) -> usize
where
    I: IntoIterator,
{
    let mut dispatched = 0;
    for item in items {
        if !emit(&tx, &token, item).await {
            debug!(dispatched, "dispatch stopped early");
            return dispatched;
        }
        dispatched += 1;
    }
    trace!(dispatched, "dispatch finished");
    dispatched
}

/// Feed every ID of `range`, ascending.
pub(crate) async fn dispatch_range(
    range: WorkRange,
    tx: mpsc::Sender<i64>,
    token: CancellationToken,
) -> usize {
    dispatch(range.ids(), tx, token).await
}
