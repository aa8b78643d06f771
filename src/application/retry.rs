use std::time::Duration;

/// Bounded polling policy for "verify my payment" after a checkout redirect.
///
/// A pure function of the attempt count, so callers (UI timers, scripts) own
/// the clock and the loop while the ceiling lives here. Polling only masks
/// webhook latency; correctness comes from the resolver's ledger self-heal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Delay before the next poll, or `None` once the ceiling is reached.
    /// `attempt` counts completed polls, starting at 0.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts).then_some(self.interval)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        self.delay_for_attempt(attempt).is_some()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        // Covers typical webhook delivery lag after checkout without letting
        // clients poll forever.
        Self::new(10, Duration::from_secs(3))
    }
}
