//! Worker registry and its eviction sweep.
//!
//! Workers announce themselves with `register` and keep themselves alive with
//! `heartbeat`. A worker is available while its last heartbeat is younger
//! than the wait timeout. Liveness is derived from the timestamp on every
//! read, so a silent worker drops out of [`WorkerRegistry::live_workers`] as
//! soon as the timeout passes; the [`RegistrySweeper`] only reclaims the
//! entries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use distcalc_common::{WorkerLiveness, WorkerStatus};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

pub struct WorkerRegistry {
    workers: Mutex<HashMap<String, Instant>>,
    wait_timeout: Duration,
}

impl WorkerRegistry {
    pub fn new(wait_timeout: Duration) -> Self {
        Self {
            workers: Mutex::new(HashMap::new()),
            wait_timeout,
        }
    }

    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }

    /// Records a worker as alive now.
    ///
    /// Returns `true` if the address was not in the registry before.
    pub async fn register(&self, addr: &str) -> bool {
        let mut workers = self.workers.lock().await;
        let is_new = workers.insert(addr.to_string(), Instant::now()).is_none();
        if is_new {
            info!("Registered worker {}", addr);
        } else {
            debug!("Worker {} re-registered", addr);
        }
        is_new
    }

    /// Refreshes a worker's timestamp, registering it if unknown.
    ///
    /// Returns `true` if the worker was already registered.
    pub async fn heartbeat(&self, addr: &str) -> bool {
        let mut workers = self.workers.lock().await;
        let was_known = workers.insert(addr.to_string(), Instant::now()).is_some();
        if !was_known {
            info!("Heartbeat from unknown worker {}, registering it", addr);
        }
        was_known
    }

    /// Addresses of all available workers, sorted.
    pub async fn live_workers(&self) -> Vec<String> {
        let now = Instant::now();
        let workers = self.workers.lock().await;
        let mut live: Vec<String> = workers
            .iter()
            .filter(|(_, last_beat)| self.liveness(now, **last_beat) == WorkerLiveness::Available)
            .map(|(addr, _)| addr.clone())
            .collect();
        live.sort();
        live
    }

    /// Every registered worker with its liveness, sorted by address.
    pub async fn workers(&self) -> Vec<WorkerStatus> {
        let now = Instant::now();
        let workers = self.workers.lock().await;
        let mut statuses: Vec<WorkerStatus> = workers
            .iter()
            .map(|(addr, last_beat)| WorkerStatus {
                addr: addr.clone(),
                state: self.liveness(now, *last_beat),
                since_last_beat_ms: now.saturating_duration_since(*last_beat).as_millis() as u64,
            })
            .collect();
        statuses.sort_by(|a, b| a.addr.cmp(&b.addr));
        statuses
    }

    pub async fn len(&self) -> usize {
        self.workers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.workers.lock().await.is_empty()
    }

    /// Removes every Lost worker and returns the evicted addresses.
    pub async fn sweep(&self) -> Vec<String> {
        let now = Instant::now();
        let mut workers = self.workers.lock().await;
        let mut evicted = Vec::new();
        workers.retain(|addr, last_beat| {
            let keep = self.liveness(now, *last_beat) == WorkerLiveness::Available;
            if !keep {
                evicted.push(addr.clone());
            }
            keep
        });
        evicted.sort();
        evicted
    }

    fn liveness(&self, now: Instant, last_beat: Instant) -> WorkerLiveness {
        if now.saturating_duration_since(last_beat) > self.wait_timeout {
            WorkerLiveness::Lost
        } else {
            WorkerLiveness::Available
        }
    }
}

/// Periodically evicts Lost workers from a [`WorkerRegistry`].
pub struct RegistrySweeper {
    registry: Arc<WorkerRegistry>,
    interval: Duration,
}

impl RegistrySweeper {
    pub fn new(registry: Arc<WorkerRegistry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// Starts the sweep task.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        let mut interval = tokio::time::interval(self.interval);

        loop {
            interval.tick().await;
            for addr in self.registry.sweep().await {
                info!("Evicted worker {} after missing heartbeats", addr);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_reports_new_workers() {
        let registry = WorkerRegistry::new(Duration::from_secs(10));
        assert!(registry.register("127.0.0.1:9001").await);
        assert!(!registry.register("127.0.0.1:9001").await);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_heartbeat_registers_unknown_worker() {
        let registry = WorkerRegistry::new(Duration::from_secs(10));
        assert!(!registry.heartbeat("127.0.0.1:9002").await);
        assert!(registry.heartbeat("127.0.0.1:9002").await);
        assert_eq!(registry.live_workers().await, vec!["127.0.0.1:9002".to_string()]);
    }

    #[tokio::test]
    async fn test_live_workers_are_sorted() {
        let registry = WorkerRegistry::new(Duration::from_secs(10));
        registry.register("c:3").await;
        registry.register("a:1").await;
        registry.register("b:2").await;
        assert_eq!(registry.live_workers().await, vec!["a:1", "b:2", "c:3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_is_lost_after_wait_timeout() {
        let registry = WorkerRegistry::new(Duration::from_secs(2));
        registry.register("a:1").await;

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(registry.live_workers().await, vec!["a:1"]);

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(registry.live_workers().await.is_empty());

        let statuses = registry.workers().await;
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].state, WorkerLiveness::Lost);
        assert_eq!(statuses[0].since_last_beat_ms, 2001);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_keeps_worker_alive() {
        let registry = WorkerRegistry::new(Duration::from_secs(2));
        registry.register("a:1").await;

        for _ in 0..5 {
            tokio::time::advance(Duration::from_millis(1500)).await;
            registry.heartbeat("a:1").await;
        }

        assert_eq!(registry.live_workers().await, vec!["a:1"]);
        assert!(registry.sweep().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_evicts_only_lost_workers() {
        let registry = WorkerRegistry::new(Duration::from_secs(2));
        registry.register("old:1").await;
        tokio::time::advance(Duration::from_secs(1)).await;
        registry.register("new:2").await;
        tokio::time::advance(Duration::from_millis(1500)).await;

        assert_eq!(registry.sweep().await, vec!["old:1".to_string()]);
        assert_eq!(registry.live_workers().await, vec!["new:2"]);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_evicts_within_one_interval() {
        let registry = Arc::new(WorkerRegistry::new(Duration::from_secs(2)));
        registry.register("a:1").await;
        let handle = RegistrySweeper::new(registry.clone(), Duration::from_secs(1)).spawn();

        tokio::time::sleep(Duration::from_millis(3100)).await;
        assert!(registry.is_empty().await);

        handle.abort();
    }
}
