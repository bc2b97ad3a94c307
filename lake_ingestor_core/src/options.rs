use std::time::Duration;

use crate::batcher::FlushPolicy;

pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 3;
pub const DEFAULT_DRAIN_RETRIES: u32 = 2;
pub const DEFAULT_DRAIN_BACKOFF: Duration = Duration::from_millis(500);

/// What happens to a snapshot whose write failed during normal operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteFailurePolicy {
    /// Discard the records.
    #[default]
    Drop,
    /// Put the records back and try again on a later flush cycle, giving up
    /// after `max_attempts` consecutive failures of the same key.
    Reinsert { max_attempts: u32 },
}

#[derive(Debug, Clone)]
pub struct IngestorOptions {
    pub poll_timeout: Duration,
    pub flush_policy: FlushPolicy,
    pub write_failure_policy: WriteFailurePolicy,
    /// Extra attempts of each write during the final drain.
    pub drain_retries: u32,
    pub drain_backoff: Duration,
}

impl Default for IngestorOptions {
    fn default() -> Self {
        Self {
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            flush_policy: FlushPolicy::default(),
            write_failure_policy: WriteFailurePolicy::default(),
            drain_retries: DEFAULT_DRAIN_RETRIES,
            drain_backoff: DEFAULT_DRAIN_BACKOFF,
        }
    }
}

impl IngestorOptions {
    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    pub fn with_flush_policy(mut self, flush_policy: FlushPolicy) -> Self {
        self.flush_policy = flush_policy;
        self
    }

    pub fn with_write_failure_policy(mut self, write_failure_policy: WriteFailurePolicy) -> Self {
        self.write_failure_policy = write_failure_policy;
        self
    }

    pub fn with_drain_retries(mut self, drain_retries: u32, drain_backoff: Duration) -> Self {
        self.drain_retries = drain_retries;
        self.drain_backoff = drain_backoff;
        self
    }
}
