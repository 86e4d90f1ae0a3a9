// =============================================================================
// Rolling-window rate limiter — one instance shared by every fetch path
// =============================================================================
//
// Binance allows 1200 request weight per minute. Every outbound request takes
// one permit; when the window is full the caller sleeps until the oldest call
// leaves the window instead of failing.
//
// The call ledger sits behind a parking_lot mutex that is only held while the
// ledger is pruned and appended, never across an await.
// =============================================================================

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

/// Limits outbound calls to `max_calls` per rolling `window`.
pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    ledger: Mutex<VecDeque<Instant>>,
}

/// Serialisable view of the limiter state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub in_window: usize,
    pub max_calls: usize,
    pub window_secs: u64,
}

impl RateLimiter {
    pub fn new(max_calls: usize, window: Duration) -> Self {
        let max_calls = max_calls.max(1);
        Self {
            max_calls,
            window,
            ledger: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    /// Wait until a call may proceed, then count it.
    pub async fn acquire(&self) {
        loop {
            let wait = match self.try_acquire(Instant::now()) {
                None => return,
                Some(wait) => wait,
            };
            debug!(
                wait_ms = wait.as_millis() as u64,
                max_calls = self.max_calls,
                "rate limit reached, waiting for window to roll"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Wait until the window has room without counting a call. Another caller
    /// may still take the free slot first; `acquire` stays authoritative.
    pub async fn ready(&self) {
        loop {
            let wait = {
                let now = Instant::now();
                let mut ledger = self.ledger.lock();
                prune(&mut ledger, now, self.window);
                self.wait_time(&ledger, now)
            };
            match wait {
                None => return,
                Some(wait) => tokio::time::sleep(wait).await,
            }
        }
    }

    /// Record a call at `now` if the window has room; otherwise return how
    /// long until the oldest call expires.
    fn try_acquire(&self, now: Instant) -> Option<Duration> {
        let mut ledger = self.ledger.lock();
        prune(&mut ledger, now, self.window);

        let wait = self.wait_time(&ledger, now);
        if wait.is_none() {
            ledger.push_back(now);
        }
        wait
    }

    fn wait_time(&self, ledger: &VecDeque<Instant>, now: Instant) -> Option<Duration> {
        if ledger.len() < self.max_calls {
            return None;
        }
        let oldest = ledger.front().copied().unwrap_or(now);
        Some((oldest + self.window).saturating_duration_since(now))
    }

    /// Calls counted in the current window.
    pub fn in_window(&self) -> usize {
        let mut ledger = self.ledger.lock();
        prune(&mut ledger, Instant::now(), self.window);
        ledger.len()
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        RateLimitSnapshot {
            in_window: self.in_window(),
            max_calls: self.max_calls,
            window_secs: self.window.as_secs(),
        }
    }
}

fn prune(ledger: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = ledger.front() {
        if now.saturating_duration_since(oldest) >= window {
            ledger.pop_front();
        } else {
            break;
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_calls", &self.max_calls)
            .field("window", &self.window)
            .field("in_window", &self.ledger.lock().len())
            .finish()
    }
}
