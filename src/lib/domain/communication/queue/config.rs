use std::time::Duration;

use crate::domain::communication::retry::RetryPolicy;

/// Queue settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Items handed to the dispatcher per pass
    pub batch_size: usize,

    /// Time between passes
    pub interval: Duration,

    /// Items the queue may hold before `enqueue` is refused
    pub max_size: usize,

    /// Attempt ceiling and backoff between passes for one item
    pub retry: RetryPolicy,

    /// Keep sent items as `completed` until cleared instead of removing them
    pub retain_completed: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            interval: Duration::from_secs(5),
            max_size: 1000,
            retry: RetryPolicy::default(),
            retain_completed: false,
        }
    }
}
