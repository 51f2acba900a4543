//! Cooperative cancellation
//!
//! One token per job. Every suspension point in the engine (stagger sleep,
//! jitter, inter-round delay, flood wait) goes through [`CancelToken::sleep`],
//! so a stop request is observed immediately rather than after a long
//! uninterruptible sleep. Cancellation never kills in-flight remote calls;
//! tasks observe the token at the next checkpoint and wind down.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Shared cancellation flag for one job
///
/// Cheap to clone; all clones observe the same flag. Cancelling twice, or
/// after the job finished, is a no-op.
#[derive(Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request cancellation
    pub fn cancel(&self) {
        // send_replace works even with no active receivers
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the token is cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Cancellable sleep
    ///
    /// Returns true when the full duration elapsed, false when the token
    /// fired first.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        if duration.is_zero() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.cancelled() => false,
        }
    }

    /// Cancellable sleep in whole seconds
    pub async fn sleep_secs(&self, secs: u64) -> bool {
        self.sleep(Duration::from_secs(secs)).await
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_sleep_completes_when_not_cancelled() {
        let token = CancelToken::new();
        assert!(token.sleep(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn test_sleep_zero_is_immediate() {
        let token = CancelToken::new();
        assert!(token.sleep(Duration::ZERO).await);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_sleep() {
        let token = CancelToken::new();
        let sleeper = token.clone();

        let handle = tokio::spawn(async move { sleeper.sleep(Duration::from_secs(60)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        let start = Instant::now();
        token.cancel();

        let completed = handle.await.unwrap();
        assert!(!completed);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_sleep_after_cancel_returns_immediately() {
        let token = CancelToken::new();
        token.cancel();
        let start = Instant::now();
        assert!(!token.sleep(Duration::from_secs(60)).await);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let token = CancelToken::new();
        token.cancel();
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
