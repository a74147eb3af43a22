//! Fixed-interval gates for the analysis backend quota
//!
//! The backend allows one submission per 15s and one poll per 3s for the whole
//! process. Each limit is an [`IntervalGate`]: a shared, cloneable handle that
//! hands out start slots spaced at least one period apart. Callers block only
//! their own task while waiting for their slot.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::trace;

/// Process-wide gate allowing one operation to begin per period
///
/// # Algorithm
///
/// - The gate remembers the earliest instant the next operation may begin
/// - `acquire` reserves `max(next, now)` as its slot and advances `next` by
///   one period, then sleeps until the slot
/// - The reservation is made under an async mutex whose waiters are served
///   in FIFO order, so slots are granted first-come-first-served
///
/// The first acquire on a fresh gate is immediate. A caller that is dropped
/// while sleeping still consumes its slot; the quota is never exceeded.
#[derive(Clone, Debug)]
pub struct IntervalGate {
    name: &'static str,
    period: Duration,
    next_slot: Arc<Mutex<Option<Instant>>>,
}

impl IntervalGate {
    /// Create a gate with the given spacing
    ///
    /// # Arguments
    ///
    /// * `name` - Label used in trace output ("submit", "poll")
    /// * `period` - Minimum spacing between two operation starts
    ///
    /// # Examples
    ///
    /// ```
    /// use download_gate::rate_limiter::IntervalGate;
    /// use std::time::Duration;
    ///
    /// let submissions = IntervalGate::new("submit", Duration::from_secs(15));
    /// assert_eq!(submissions.period(), Duration::from_secs(15));
    /// ```
    #[must_use]
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self {
            name,
            period,
            next_slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Minimum spacing between operation starts
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait for this caller's slot
    ///
    /// Returns at the instant the operation may begin.
    pub async fn acquire(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next = Some(slot + self.period);
            slot
        };

        trace!(gate = self.name, wait = ?slot.saturating_duration_since(Instant::now()), "gate slot reserved");
        sleep_until(slot).await;
    }
}
