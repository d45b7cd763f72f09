//! Calls from the orchestrator to workers.

use std::time::Duration;

use distcalc_common::protocol::methods;
use distcalc_common::transport::{normalize_endpoint, JsonRpcClient};
use distcalc_common::{DistcalcError, OperationRequest, Result};
use futures::future::{BoxFuture, FutureExt};
use serde_json::json;

/// The two worker methods the orchestrator needs.
///
/// Implementations must be usable from many dispatch tasks at once.
pub trait WorkerClient: Send + Sync {
    /// Asks `worker` to apply one binary operation.
    fn execute<'a>(
        &'a self,
        worker: &'a str,
        request: OperationRequest,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<f64>>;

    /// Asks `worker` how many more operations it would accept right now.
    fn free_capacity<'a>(&'a self, worker: &'a str, timeout: Duration) -> BoxFuture<'a, Result<u32>>;
}

/// [`WorkerClient`] speaking JSON-RPC over HTTP.
#[derive(Clone, Default)]
pub struct HttpWorkerClient {
    client: JsonRpcClient,
}

impl HttpWorkerClient {
    pub fn new() -> Self {
        Self {
            client: JsonRpcClient::new(),
        }
    }
}

impl WorkerClient for HttpWorkerClient {
    fn execute<'a>(
        &'a self,
        worker: &'a str,
        request: OperationRequest,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<f64>> {
        async move {
            let params = serde_json::to_value(&request)?;
            let endpoint = normalize_endpoint(worker);
            let value = self
                .client
                .call(&endpoint, methods::EXECUTE, params, timeout)
                .await?;
            value
                .as_f64()
                .ok_or_else(|| DistcalcError::InvalidResponse(format!("expected a number, got {}", value)))
        }
        .boxed()
    }

    fn free_capacity<'a>(&'a self, worker: &'a str, timeout: Duration) -> BoxFuture<'a, Result<u32>> {
        async move {
            let endpoint = normalize_endpoint(worker);
            let value = self
                .client
                .call(&endpoint, methods::FREE_CAPACITY, json!({}), timeout)
                .await?;
            value
                .as_u64()
                .map(|free| free.min(u32::MAX as u64) as u32)
                .ok_or_else(|| {
                    DistcalcError::InvalidResponse(format!("expected a capacity, got {}", value))
                })
        }
        .boxed()
    }
}
