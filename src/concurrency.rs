//! Cancellable-wait helper shared by every suspension point in the worker.
//!
//! The disk-refresh wait and the between-iteration sleep both need to wake
//! within bounded time on a stop signal. Both are a plain timed sleep raced
//! against cancellation; this is the one place that pattern lives.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Sleep for `duration`, or until `cancel` fires, whichever comes first.
///
/// Returns `true` if the sleep ran to completion, `false` if it was cut
/// short by cancellation.
pub async fn cancellable_sleep(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancel.cancelled() => false,
    }
}
