//! Configuration for task execution

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Concurrency used when none is configured, capped by the host count
pub const DEFAULT_CONCURRENCY_CEILING: usize = 100;

/// Task execution settings
///
/// Read-only once a task starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Maximum hosts handled at the same time
    #[serde(default)]
    pub concurrency: Option<usize>,
    /// Extra attempts after a retryable connection failure
    #[serde(default)]
    pub connect_retries: u32,
    /// Delay between connection attempts
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Per-file upload timeout
    #[serde(default)]
    pub transfer_timeout_secs: Option<u64>,
    /// Whole-task deadline; cancels the task when reached
    #[serde(default)]
    pub task_timeout_secs: Option<u64>,
    /// Progress event broadcast channel capacity
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_event_channel_capacity() -> usize {
    1024
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            concurrency: None,
            connect_retries: 0,
            retry_delay_ms: default_retry_delay_ms(),
            transfer_timeout_secs: None,
            task_timeout_secs: None,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl TaskConfig {
    /// Number of host workers allowed to run at once for `host_count` hosts
    ///
    /// Never zero and never more than the number of hosts.
    #[must_use]
    pub fn effective_concurrency(&self, host_count: usize) -> usize {
        let limit = self
            .concurrency
            .filter(|c| *c > 0)
            .unwrap_or(DEFAULT_CONCURRENCY_CEILING);
        limit.min(host_count).max(1)
    }

    /// Delay between connection attempts
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Per-file upload timeout
    #[must_use]
    pub fn transfer_timeout(&self) -> Option<Duration> {
        self.transfer_timeout_secs.map(Duration::from_secs)
    }

    /// Whole-task deadline
    #[must_use]
    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs.map(Duration::from_secs)
    }
}
