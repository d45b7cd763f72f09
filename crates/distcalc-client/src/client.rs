use std::collections::BTreeMap;
use std::time::Duration;

use distcalc_common::protocol::error::{DistcalcError, Result};
use distcalc_common::transport::{normalize_endpoint, JsonRpcClient};
use distcalc_common::{
    methods, DelaysRequest, DelaysResponse, JobStatusResponse, OwnerId, ResultRequest,
    SetDelaysRequest, SubmitRequest, SubmitResponse, WorkerStatus,
};
use serde_json::Value;

/// Typed client for the orchestrator's client-facing methods.
///
/// Every call opens its own HTTP request, so one client can be shared by
/// many tasks.
#[derive(Clone)]
pub struct DistcalcClient {
    endpoint: String,
    client: JsonRpcClient,
    timeout: Duration,
}

impl DistcalcClient {
    /// `orchestrator_url` may omit the scheme; `http://` is assumed.
    pub fn new(orchestrator_url: impl AsRef<str>) -> Self {
        Self {
            endpoint: normalize_endpoint(orchestrator_url.as_ref()),
            client: JsonRpcClient::new(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Per-call timeout (default 30s).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Calls any orchestrator method with raw JSON params.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.client
            .call(&self.endpoint, method, params, self.timeout)
            .await
    }

    /// Submits an infix expression and returns the job id.
    pub async fn submit(&self, owner: OwnerId, expression: &str) -> Result<String> {
        let params = serde_json::to_value(SubmitRequest {
            owner,
            expression: expression.to_string(),
        })?;
        let response: SubmitResponse = serde_json::from_value(self.call(methods::SUBMIT, params).await?)?;
        Ok(response.job_id)
    }

    pub async fn result(&self, job_id: &str) -> Result<JobStatusResponse> {
        let params = serde_json::to_value(ResultRequest {
            job_id: job_id.to_string(),
        })?;
        Ok(serde_json::from_value(self.call(methods::RESULT, params).await?)?)
    }

    /// Updates some of `owner`'s operator delays, in milliseconds.
    pub async fn set_delays(
        &self,
        owner: OwnerId,
        delays: BTreeMap<String, u64>,
    ) -> Result<DelaysResponse> {
        let params = serde_json::to_value(SetDelaysRequest { owner, delays })?;
        Ok(serde_json::from_value(self.call(methods::SET_DELAYS, params).await?)?)
    }

    pub async fn delays(&self, owner: OwnerId) -> Result<DelaysResponse> {
        let params = serde_json::to_value(DelaysRequest { owner })?;
        Ok(serde_json::from_value(self.call(methods::DELAYS, params).await?)?)
    }

    pub async fn workers(&self) -> Result<Vec<WorkerStatus>> {
        Ok(serde_json::from_value(self.call(methods::WORKERS, Value::Null).await?)?)
    }

    /// Polls `result` every `poll_interval` until the job is finished.
    ///
    /// A failed job with a retry scheduled is not finished.
    ///
    /// # Errors
    /// [`DistcalcError::Timeout`] if the job is still running after
    /// `deadline`, or any error from the `result` call itself.
    pub async fn wait_for_result(
        &self,
        job_id: &str,
        poll_interval: Duration,
        deadline: Duration,
    ) -> Result<JobStatusResponse> {
        let poll = async {
            loop {
                let status = self.result(job_id).await?;
                if status.is_finished() {
                    return Ok(status);
                }
                tokio::time::sleep(poll_interval).await;
            }
        };

        tokio::time::timeout(deadline, poll)
            .await
            .map_err(|_| DistcalcError::Timeout(deadline.as_millis() as u64))?
    }
}
