//! # Backoff Calculation
//!
//! Fibonacci backoff for failed reconciles, tracked per resource.
//!
//! The sequence is `min * fib(n)` capped at `max`; with the 5s/300s defaults that is
//! 5s, 5s, 10s, 15s, 25s, 40s, 65s, 105s, 170s, 275s, then 300s.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Fibonacci backoff calculator
#[derive(Debug, Clone, Copy)]
pub struct FibonacciBackoff;

impl FibonacciBackoff {
    /// Backoff for the `error_count`-th consecutive error (0-indexed)
    pub fn calculate_for_error_count(error_count: u32, min_secs: u64, max_secs: u64) -> Duration {
        let (mut previous, mut current) = (0u64, 1u64);
        for _ in 0..error_count {
            if current.saturating_mul(min_secs) >= max_secs {
                break;
            }
            let next = previous.saturating_add(current);
            previous = current;
            current = next;
        }
        Duration::from_secs(current.saturating_mul(min_secs).clamp(min_secs, max_secs))
    }
}

/// Consecutive error counts per resource key
#[derive(Debug, Default)]
pub struct BackoffTracker {
    errors: Mutex<HashMap<String, u32>>,
}

impl BackoffTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more error for `key`, returning the new consecutive count
    pub fn record_error(&self, key: &str) -> u32 {
        let mut errors = self.errors.lock().unwrap_or_else(PoisonError::into_inner);
        let count = errors.entry(key.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    /// Forget the errors of `key` after a successful reconcile
    pub fn reset(&self, key: &str) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}
