//! JSON-RPC method routing for a compute worker.
//!
//! - `execute`: run one binary operation
//! - `free_capacity`: remaining in-flight slots
//! - `_metrics` / `_info`: built-in monitoring

use distcalc_common::{methods, JsonRpcError, JsonRpcRequest, JsonRpcResponse, OperationRequest};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::worker::Worker;

pub struct WorkerRouter {
    worker: Arc<Worker>,
}

impl WorkerRouter {
    pub fn new(worker: Arc<Worker>) -> Self {
        Self { worker }
    }

    pub async fn handle_request(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        let id = req.id.clone();
        let result = self.dispatch(req).await;
        JsonRpcResponse::from_result(id, result)
    }

    async fn dispatch(&self, req: JsonRpcRequest) -> Result<Value, JsonRpcError> {
        match req.method.as_str() {
            methods::EXECUTE => {
                let request: OperationRequest = req.parse_params()?;
                self.worker
                    .execute(request)
                    .await
                    .map(|value| json!(value))
                    .map_err(|e| e.to_jsonrpc())
            }
            methods::FREE_CAPACITY => Ok(json!(self.worker.free_capacity())),
            methods::METRICS => self
                .worker
                .get_metrics()
                .map_err(|e| JsonRpcError::internal_error(&e.to_string())),
            methods::INFO => self
                .worker
                .get_info()
                .map_err(|e| JsonRpcError::internal_error(&e.to_string())),
            _ => Err(JsonRpcError::method_not_found()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::WorkerLimits;
    use distcalc_common::protocol::jsonrpc::{DIVISION_BY_ZERO, INVALID_PARAMS, METHOD_NOT_FOUND};

    fn router() -> WorkerRouter {
        WorkerRouter::new(Arc::new(Worker::new(WorkerLimits::default()).unwrap()))
    }

    fn request(method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id: json!(1),
        }
    }

    #[tokio::test]
    async fn test_execute() {
        let response = router()
            .handle_request(request("execute", json!({"op": "*", "a": 6, "b": 7, "delay_ms": 0})))
            .await;
        assert_eq!(response.result, Some(json!(42.0)));
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_execute_division_by_zero() {
        let response = router()
            .handle_request(request("execute", json!({"op": "/", "a": 5, "b": 0, "delay_ms": 0})))
            .await;
        assert_eq!(response.error.unwrap().code, DIVISION_BY_ZERO);
    }

    #[tokio::test]
    async fn test_execute_invalid_params() {
        let response = router()
            .handle_request(request("execute", json!({"op": "+"})))
            .await;
        assert_eq!(response.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_free_capacity() {
        let response = router().handle_request(request("free_capacity", Value::Null)).await;
        assert_eq!(response.result, Some(json!(10)));
    }

    #[tokio::test]
    async fn test_info_and_metrics() {
        let router = router();
        let info = router.handle_request(request("_info", Value::Null)).await;
        assert_eq!(info.result.unwrap()["server_type"], "worker");

        let metrics = router.handle_request(request("_metrics", Value::Null)).await;
        assert!(metrics.result.unwrap()["methods"].is_object());
    }

    #[tokio::test]
    async fn test_method_not_found() {
        let response = router().handle_request(request("submit", json!({}))).await;
        assert_eq!(response.error.unwrap().code, METHOD_NOT_FOUND);
    }
}
