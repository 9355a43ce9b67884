//! Cancellable delayed callbacks.
//!
//! Timers carry no session state. A timer body captures only what it was
//! given at scheduling time (typically a user id and a generation counter)
//! and re-checks the store when it fires; if the state moved on, the fire is
//! a no-op. Cancellation is explicit via [`TimerHandle::cancel`]; dropping a
//! handle does not cancel the timer.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Handle to a scheduled timer.
#[derive(Debug)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    /// Cancel the timer. If the body already started it runs to completion.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the timer was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Schedule `body` to run once after `delay` on the tokio runtime.
pub fn schedule<F, Fut>(delay: Duration, body: F) -> TimerHandle
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let token = CancellationToken::new();
    let child = token.clone();
    drop(tokio::spawn(async move {
        tokio::select! {
            () = child.cancelled() => {}
            () = tokio::time::sleep(delay) => body().await,
        }
    }));
    TimerHandle { token }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let fired = Arc::new(AtomicU32::new(0));
        let f = fired.clone();
        let _handle = schedule(Duration::from_secs(2), move || async move {
            f.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(1_999)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_fire() {
        let fired = Arc::new(AtomicU32::new(0));
        let f = fired.clone();
        let handle = schedule(Duration::from_secs(2), move || async move {
            f.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(handle.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_leaves_timer_running() {
        let fired = Arc::new(AtomicU32::new(0));
        let f = fired.clone();
        let handle = schedule(Duration::from_secs(1), move || async move {
            f.fetch_add(1, Ordering::SeqCst);
        });
        drop(handle);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
