//! Orchestrator configuration.
//!
//! One [`OrchestratorConfig`] is built at process start and handed to
//! [`Orchestrator::new`](crate::Orchestrator::new); nothing reads
//! configuration from global state.

use std::time::Duration;

/// Bounded exponential backoff for jobs that found no available worker.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Re-enqueues allowed before the job fails for good
    ///
    /// Default: 10
    pub max_retries: u32,
    /// Wait before the first re-enqueue
    ///
    /// Default: 100ms
    pub initial_backoff_ms: u64,
    /// Cap on any single wait
    ///
    /// Default: 5000ms
    pub max_backoff_ms: u64,
    /// Each retry waits: previous_backoff * multiplier
    ///
    /// Default: 2.0
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            initial_backoff_ms: 100,
            max_backoff_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Wait before re-enqueue number `retry` (1-based).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let mut backoff_ms = self.initial_backoff_ms.min(self.max_backoff_ms);
        for _ in 1..retry {
            if backoff_ms >= self.max_backoff_ms {
                break;
            }
            backoff_ms = std::cmp::min(
                (backoff_ms as f64 * self.backoff_multiplier) as u64,
                self.max_backoff_ms,
            );
        }
        Duration::from_millis(backoff_ms)
    }
}

/// Process-wide orchestrator settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// A worker is Lost once this long has passed since its last heartbeat
    pub wait_timeout: Duration,
    /// Period of the registry eviction sweep
    pub sweep_interval: Duration,
    /// Timeout for each `free_capacity` probe
    pub probe_timeout: Duration,
    /// Added to the operator delay to bound one `execute` call
    pub dispatch_timeout: Duration,
    /// Jobs waiting for dispatch
    pub queue_capacity: usize,
    /// Jobs evaluated at the same time
    pub max_concurrent_jobs: usize,
    /// Delay assigned to every operator for owners without their own table
    pub default_delay: Duration,
    pub retry: RetryConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(1),
            probe_timeout: Duration::from_millis(500),
            dispatch_timeout: Duration::from_secs(5),
            queue_capacity: 128,
            max_concurrent_jobs: 64,
            default_delay: Duration::from_millis(500),
            retry: RetryConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }

    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    pub fn with_dispatch_timeout(mut self, dispatch_timeout: Duration) -> Self {
        self.dispatch_timeout = dispatch_timeout;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_max_concurrent_jobs(mut self, max_concurrent_jobs: usize) -> Self {
        self.max_concurrent_jobs = max_concurrent_jobs;
        self
    }

    pub fn with_default_delay(mut self, default_delay: Duration) -> Self {
        self.default_delay = default_delay;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any timeout or interval is zero, if the queue or
    /// the evaluation pool has no room, or if the backoff would shrink.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("wait timeout", self.wait_timeout),
            ("sweep interval", self.sweep_interval),
            ("probe timeout", self.probe_timeout),
            ("dispatch timeout", self.dispatch_timeout),
        ] {
            if value.is_zero() {
                return Err(format!("{} must be greater than zero", name));
            }
        }

        if self.queue_capacity == 0 {
            return Err("queue capacity must be greater than zero".to_string());
        }

        if self.max_concurrent_jobs == 0 {
            return Err("max concurrent jobs must be greater than zero".to_string());
        }

        if self.retry.backoff_multiplier < 1.0 {
            return Err(format!(
                "backoff multiplier must be >= 1.0 (got {})",
                self.retry.backoff_multiplier
            ));
        }

        if self.retry.initial_backoff_ms == 0 {
            return Err("initial backoff must be greater than zero".to_string());
        }

        Ok(())
    }
}
