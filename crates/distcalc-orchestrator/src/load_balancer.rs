//! Capacity-aware worker selection.
//!
//! Every live worker is probed for its free capacity in parallel. The worker
//! with the most room wins; ties go to the smallest address. Workers that
//! report zero, fail the probe or exceed the probe timeout are skipped.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::DispatchError;
use crate::registry::WorkerRegistry;
use crate::worker_client::WorkerClient;

pub struct LoadBalancer {
    registry: Arc<WorkerRegistry>,
    client: Arc<dyn WorkerClient>,
    probe_timeout: Duration,
}

impl LoadBalancer {
    pub fn new(
        registry: Arc<WorkerRegistry>,
        client: Arc<dyn WorkerClient>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            client,
            probe_timeout,
        }
    }

    /// Picks the live worker with the most free capacity.
    pub async fn select_worker(&self) -> Result<String, DispatchError> {
        let capacities = self.probe_all().await;
        pick_target(&capacities)
            .map(str::to_string)
            .ok_or(DispatchError::NoAvailableWorker)
    }

    /// Free capacity of every live worker that answered in time.
    pub async fn probe_all(&self) -> Vec<(String, u32)> {
        let live = self.registry.live_workers().await;

        let probes = live.into_iter().map(|addr| {
            let client = self.client.clone();
            let timeout = self.probe_timeout;
            async move {
                let result =
                    tokio::time::timeout(timeout, client.free_capacity(&addr, timeout)).await;
                (addr, result)
            }
        });

        futures::future::join_all(probes)
            .await
            .into_iter()
            .filter_map(|(addr, result)| match result {
                Ok(Ok(free)) => Some((addr, free)),
                Ok(Err(e)) => {
                    debug!("Capacity probe to {} failed: {}", addr, e);
                    None
                }
                Err(_) => {
                    debug!("Capacity probe to {} timed out", addr);
                    None
                }
            })
            .collect()
    }
}

/// Chooses among probed workers: largest free capacity, smallest address on
/// ties, never a worker with zero capacity.
pub fn pick_target(capacities: &[(String, u32)]) -> Option<&str> {
    capacities
        .iter()
        .filter(|(_, free)| *free > 0)
        .max_by(|(addr_a, free_a), (addr_b, free_b)| {
            free_a.cmp(free_b).then_with(|| addr_b.cmp(addr_a))
        })
        .map(|(addr, _)| addr.as_str())
}
