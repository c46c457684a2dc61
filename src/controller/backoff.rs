//! # Fibonacci Backoff
//!
//! Retry intervals for failed reconciles: `min, min, 2min, 3min, 5min, ...`
//! capped at `max`. Each resource keeps its own state so one failing record
//! never slows down the others.

/// Fibonacci backoff in seconds
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    max_secs: u64,
    previous: u64,
    current: u64,
}

impl FibonacciBackoff {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        let min_secs = min_secs.max(1);
        Self {
            max_secs: max_secs.max(min_secs),
            previous: 0,
            current: min_secs,
        }
    }

    /// Next interval, advancing the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let value = self.current.min(self.max_secs);
        if self.current < self.max_secs {
            let next = self.previous.saturating_add(self.current);
            self.previous = self.current;
            self.current = next;
        }
        value
    }
}

/// Per-resource backoff bookkeeping
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }
}
