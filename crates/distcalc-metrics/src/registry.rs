// Copyright 2025 distcalc Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::snapshot::{MethodMetrics, MetricsSnapshot, WorkerMetrics};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Instant, SystemTime};

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Default)]
struct MethodStats {
    call_count: AtomicU64,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    total_latency_us: AtomicU64,
    max_latency_us: AtomicU64,
}

impl MethodStats {
    fn record(&self, latency_us: u64, success: bool) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if success {
            self.success_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failure_count.fetch_add(1, Ordering::Relaxed);
        }
        self.total_latency_us.fetch_add(latency_us, Ordering::Relaxed);
        self.max_latency_us.fetch_max(latency_us, Ordering::Relaxed);
    }

    fn snapshot(&self) -> MethodMetrics {
        let call_count = self.call_count.load(Ordering::Relaxed);
        let total = self.total_latency_us.load(Ordering::Relaxed);
        MethodMetrics {
            call_count,
            success_count: self.success_count.load(Ordering::Relaxed),
            failure_count: self.failure_count.load(Ordering::Relaxed),
            avg_latency_us: if call_count == 0 { 0 } else { total / call_count },
            max_latency_us: self.max_latency_us.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default)]
struct WorkerStats {
    request_count: AtomicU64,
    last_request_ms: AtomicU64,
}

impl WorkerStats {
    fn record_request(&self) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.last_request_ms.store(unix_millis(), Ordering::Relaxed);
    }

    fn snapshot(&self, worker_addr: &str) -> WorkerMetrics {
        WorkerMetrics {
            worker_addr: worker_addr.to_string(),
            request_count: self.request_count.load(Ordering::Relaxed),
            last_request_ms: self.last_request_ms.load(Ordering::Relaxed),
        }
    }
}

/// Thread-safe metrics storage.
///
/// Counters are relaxed atomics; the method and worker maps are only locked
/// to insert a new entry or to take a snapshot. Snapshots are best-effort
/// and may observe counters mid-update.
#[derive(Debug)]
pub struct MetricsRegistry {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    methods: RwLock<HashMap<String, Arc<MethodStats>>>,
    workers: RwLock<HashMap<String, Arc<WorkerStats>>>,
    start_time: Instant,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            methods: RwLock::new(HashMap::new()),
            workers: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Records one call of `method` with its latency and outcome.
    pub fn record_method_call(&self, method: &str, latency_us: u64, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }

        let stats = self.method_entry(method);
        stats.record(latency_us, success);
    }

    /// Same as [`record_method_call`](Self::record_method_call), measuring
    /// latency from `start`.
    pub fn record_call(&self, method: &str, start: Instant, success: bool) {
        self.record_method_call(method, start.elapsed().as_micros() as u64, success);
    }

    /// Counts one request routed to the worker at `worker_addr`.
    pub fn record_dispatch(&self, worker_addr: &str) {
        let existing = self
            .workers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(worker_addr)
            .cloned();
        let stats = match existing {
            Some(stats) => stats,
            None => self
                .workers
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(worker_addr.to_string())
                .or_default()
                .clone(),
        };
        stats.record_request();
    }

    fn method_entry(&self, method: &str) -> Arc<MethodStats> {
        if let Some(stats) = self
            .methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(method)
        {
            return stats.clone();
        }
        self.methods
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(method.to_string())
            .or_default()
            .clone()
    }

    pub fn uptime_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    /// Takes a snapshot; `include_workers` should be true on the orchestrator.
    pub fn snapshot(&self, include_workers: bool) -> MetricsSnapshot {
        let methods = self
            .methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, stats)| (name.clone(), stats.snapshot()))
            .collect();

        let workers = include_workers.then(|| {
            self.workers
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .map(|(addr, stats)| (addr.clone(), stats.snapshot(addr)))
                .collect()
        });

        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            uptime_ms: self.uptime_ms(),
            methods,
            workers,
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
