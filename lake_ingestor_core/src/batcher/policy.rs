use std::time::Duration;

use tokio::time::Instant;

pub const DEFAULT_SIZE_THRESHOLD: usize = 100;
pub const DEFAULT_AGE_THRESHOLD: Duration = Duration::from_secs(30);

/// Decides when the buffer table is flushed.
///
/// A flush happens when the records across all keys reach `size_threshold`,
/// or when `age_threshold` has passed since the last flush cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    pub size_threshold: usize,
    pub age_threshold: Duration,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            size_threshold: DEFAULT_SIZE_THRESHOLD,
            age_threshold: DEFAULT_AGE_THRESHOLD,
        }
    }
}

impl FlushPolicy {
    pub fn new(size_threshold: usize, age_threshold: Duration) -> Self {
        Self {
            size_threshold,
            age_threshold,
        }
    }

    pub fn should_flush(&self, total_count: usize, now: Instant, last_flush: Instant) -> bool {
        self.size_triggered(total_count) || self.age_triggered(now, last_flush)
    }

    pub fn size_triggered(&self, total_count: usize) -> bool {
        total_count >= self.size_threshold
    }

    pub fn age_triggered(&self, now: Instant, last_flush: Instant) -> bool {
        now.saturating_duration_since(last_flush) >= self.age_threshold
    }
}
