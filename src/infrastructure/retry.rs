//! Bounded polling with fixed backoff.
//!
//! No push/watch primitive is assumed available from the control plane, so
//! observation is poll-based. Every poll is bounded by an attempt count and
//! suspends cooperatively between attempts; there is no busy loop and
//! nothing blocks indefinitely.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

/// Fixed-backoff poll policy.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl PollPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Run `probe` up to `max_attempts` times, sleeping the fixed backoff
    /// between attempts, until it yields `Some`. `None` after the last
    /// attempt means the thing never showed up, which callers treat as a
    /// diagnostic, not an error.
    pub async fn poll_until<F, Fut, T>(&self, what: &str, mut probe: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        for attempt in 1..=self.max_attempts {
            if let Some(found) = probe().await {
                debug!(what, attempt, "poll succeeded");
                return Some(found);
            }
            if attempt < self.max_attempts {
                debug!(what, attempt, backoff_ms = self.backoff.as_millis() as u64, "poll miss, backing off");
                sleep(self.backoff).await;
            }
        }
        debug!(what, attempts = self.max_attempts, "poll exhausted");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_poll_stops_at_first_hit() {
        let calls = AtomicU32::new(0);
        let policy = PollPolicy::new(5, Duration::from_millis(0));
        let found = policy
            .poll_until("thing", || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { (n == 3).then_some(n) }
            })
            .await;
        assert_eq!(found, Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_is_bounded() {
        let calls = AtomicU32::new(0);
        let policy = PollPolicy::new(4, Duration::from_millis(0));
        let found: Option<u32> = policy
            .poll_until("thing", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { None }
            })
            .await;
        assert_eq!(found, None);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
