//! JSON-RPC method routing for the orchestrator.
//!
//! Client methods: `submit`, `result`, `set_delays`, `delays`, `workers`.
//! Worker methods: `register`, `heartbeat`.
//! Built-ins: `_metrics`, `_info`.

use distcalc_common::{
    methods, DelaysRequest, DelaysResponse, HeartbeatResponse, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, RegisterResponse, ResultRequest, SetDelaysRequest, SubmitRequest,
    SubmitResponse, WorkerAddrRequest,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::job::JobId;
use crate::orchestrator::Orchestrator;

pub struct OrchestratorRouter {
    orchestrator: Arc<Orchestrator>,
}

impl OrchestratorRouter {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    pub async fn handle_request(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        let id = req.id.clone();
        let result = self.dispatch(req).await;
        JsonRpcResponse::from_result(id, result)
    }

    async fn dispatch(&self, req: JsonRpcRequest) -> Result<Value, JsonRpcError> {
        match req.method.as_str() {
            methods::SUBMIT => {
                let params: SubmitRequest = req.parse_params()?;
                let job_id = self
                    .orchestrator
                    .submit(params.owner, &params.expression)
                    .await
                    .map_err(|e| e.to_jsonrpc())?;
                to_value(SubmitResponse {
                    job_id: job_id.to_string(),
                })
            }
            methods::RESULT => {
                let params: ResultRequest = req.parse_params()?;
                let job_id: JobId = params.job_id.parse().map_err(|e: crate::JobError| e.to_jsonrpc())?;
                let job = self
                    .orchestrator
                    .get_result(job_id)
                    .await
                    .map_err(|e| e.to_jsonrpc())?;
                to_value(job.status())
            }
            methods::SET_DELAYS => {
                let params: SetDelaysRequest = req.parse_params()?;
                let delays = self
                    .orchestrator
                    .set_delays(params.owner, &params.delays)
                    .await
                    .map_err(|e| e.to_jsonrpc())?;
                to_value(DelaysResponse {
                    owner: params.owner,
                    delays: delays.to_millis_map(),
                })
            }
            methods::DELAYS => {
                let params: DelaysRequest = req.parse_params()?;
                let delays = self.orchestrator.delays(params.owner).await;
                to_value(DelaysResponse {
                    owner: params.owner,
                    delays: delays.to_millis_map(),
                })
            }
            methods::REGISTER => {
                let addr = worker_addr(&req)?;
                let is_new_registration = self.orchestrator.register_worker(&addr).await;
                to_value(RegisterResponse {
                    addr,
                    is_new_registration,
                })
            }
            methods::HEARTBEAT => {
                let addr = worker_addr(&req)?;
                let was_known = self.orchestrator.heartbeat(&addr).await;
                to_value(HeartbeatResponse { addr, was_known })
            }
            methods::WORKERS => to_value(self.orchestrator.workers().await),
            methods::METRICS => self
                .orchestrator
                .get_metrics()
                .await
                .map_err(|e| JsonRpcError::internal_error(&e.to_string())),
            methods::INFO => self
                .orchestrator
                .get_info()
                .await
                .map_err(|e| JsonRpcError::internal_error(&e.to_string())),
            _ => Err(JsonRpcError::method_not_found()),
        }
    }
}

fn worker_addr(req: &JsonRpcRequest) -> Result<String, JsonRpcError> {
    let params: WorkerAddrRequest = req.parse_params()?;
    let addr = params.addr.trim();
    if addr.is_empty() {
        return Err(JsonRpcError::invalid_params("Invalid params: addr must not be empty"));
    }
    Ok(addr.to_string())
}

fn to_value<T: Serialize>(value: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
}
