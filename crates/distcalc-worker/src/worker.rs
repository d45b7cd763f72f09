use distcalc_common::protocol::error::{DistcalcError, Result};
use distcalc_common::OperationRequest;
use distcalc_metrics::{MetricsRegistry, ServerInfo, ServerType};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

use crate::executor::{ExecuteError, Executor};
use crate::limits::WorkerLimits;

/// A compute worker: the executor plus its metrics.
pub struct Worker {
    executor: Arc<Executor>,
    metrics: Arc<MetricsRegistry>,
}

impl Worker {
    /// Creates a worker with validated limits.
    pub fn new(limits: WorkerLimits) -> Result<Self> {
        limits
            .validate()
            .map_err(|e| DistcalcError::InvalidRequest(format!("invalid worker limits: {}", e)))?;

        Ok(Self {
            executor: Arc::new(Executor::new(&limits)),
            metrics: Arc::new(MetricsRegistry::new()),
        })
    }

    /// Executes one operation on its own task.
    ///
    /// The task is detached from the caller, so a dropped HTTP connection
    /// neither cuts the artificial delay short nor leaks the slot.
    pub async fn execute(&self, request: OperationRequest) -> std::result::Result<f64, ExecuteError> {
        let executor = self.executor.clone();
        let metrics = self.metrics.clone();

        let task = tokio::spawn(async move {
            let start = Instant::now();
            let result = executor.execute(&request).await;
            metrics.record_call(&request.op, start, result.is_ok());
            if let Err(e) = &result {
                tracing::debug!("operation {} {} {} rejected: {}", request.a, request.op, request.b, e);
            }
            result
        });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("execution task failed: {}", e);
                Err(ExecuteError::Aborted(e.to_string()))
            }
        }
    }

    pub fn free_capacity(&self) -> u32 {
        self.executor.free_capacity()
    }

    pub fn get_metrics(&self) -> Result<Value> {
        Ok(serde_json::to_value(self.metrics.snapshot(false))?)
    }

    pub fn get_info(&self) -> Result<Value> {
        let base_info = ServerInfo::new(ServerType::Worker, self.metrics.uptime_ms());
        let mut info = serde_json::to_value(base_info)?;

        if let Some(obj) = info.as_object_mut() {
            obj.insert("max_in_flight".to_string(), json!(self.executor.max_in_flight()));
            obj.insert("in_flight".to_string(), json!(self.executor.in_flight()));
            obj.insert("free_capacity".to_string(), json!(self.free_capacity()));
        }

        Ok(info)
    }
}
