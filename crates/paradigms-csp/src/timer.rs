//! Timers
//!
//! [`timeout`] is the channel form used for racing: after the delay it yields
//! one `()` and closes. [`sleep`] is the bare timer-wait suspension point used
//! by producers to pace their output.

use std::time::Duration;

use tracing::trace;

use crate::channel::Channel;
use crate::task::{self, go, TaskState};

/// Suspend the current task for `duration` (best effort, not real time)
pub async fn sleep(duration: Duration) {
    task::park(TaskState::BlockedOnTimer);
    tokio::time::sleep(duration).await;
    task::unpark();
}

/// Channel of capacity 0 that delivers a single `()` once `duration` has
/// elapsed and then closes.
///
/// The value is handed over without blocking the timer task, so an abandoned
/// timer channel never leaves a task behind.
pub fn timeout(duration: Duration) -> Channel<()> {
    let channel = Channel::unbuffered();
    let signal = channel.clone();
    go(async move {
        sleep(duration).await;
        trace!(channel = %signal.id(), elapsed_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX), "timer fired");
        signal.send_detached(());
        signal.close();
    });
    channel
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Recv;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fires_once_then_closes() {
        let start = Instant::now();
        let timer = timeout(Duration::from_millis(500));
        assert_eq!(timer.capacity(), 0);

        assert_eq!(timer.recv().await, Recv::Value(()));
        assert!(start.elapsed() >= Duration::from_millis(500));
        assert_eq!(timer.recv().await, Recv::Closed);
        assert_eq!(timer.recv().await, Recv::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_not_ready_before_deadline() {
        let timer = timeout(Duration::from_millis(500));
        tokio::time::sleep(Duration::from_millis(499)).await;
        assert_eq!(timer.try_recv(), None);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(timer.try_recv(), Some(Recv::Value(())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_advances_clock() {
        let start = Instant::now();
        sleep(Duration::from_millis(750)).await;
        assert!(start.elapsed() >= Duration::from_millis(750));
    }
}
