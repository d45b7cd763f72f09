//! Request payloads carried in JSON-RPC `params`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Method names understood by the servers.
pub mod methods {
    // worker
    pub const EXECUTE: &str = "execute";
    pub const FREE_CAPACITY: &str = "free_capacity";

    // orchestrator
    pub const SUBMIT: &str = "submit";
    pub const RESULT: &str = "result";
    pub const SET_DELAYS: &str = "set_delays";
    pub const DELAYS: &str = "delays";
    pub const REGISTER: &str = "register";
    pub const HEARTBEAT: &str = "heartbeat";
    pub const WORKERS: &str = "workers";

    // both
    pub const INFO: &str = "_info";
    pub const METRICS: &str = "_metrics";
}

/// Owner (user) identity as seen by the orchestrator.
pub type OwnerId = u64;

static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide monotonically increasing JSON-RPC request id.
pub fn next_request_id() -> u64 {
    REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

/// One binary operation sent to a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    /// Operator symbol, e.g. `"+"`
    pub op: String,
    pub a: f64,
    pub b: f64,
    /// Artificial delay the worker waits before computing
    pub delay_ms: u64,
}

/// Worker address carried by `register` and `heartbeat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerAddrRequest {
    pub addr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub owner: OwnerId,
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRequest {
    pub job_id: String,
}

/// Replaces some or all of an owner's per-operator delays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDelaysRequest {
    pub owner: OwnerId,
    /// Operator symbol to delay in milliseconds
    pub delays: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelaysRequest {
    pub owner: OwnerId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_ids_increase() {
        let first = next_request_id();
        let second = next_request_id();
        assert!(second > first);
    }

    #[test]
    fn test_operation_request_wire_shape() {
        let req = OperationRequest {
            op: "/".into(),
            a: 1.5,
            b: 3.0,
            delay_ms: 250,
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"op": "/", "a": 1.5, "b": 3.0, "delay_ms": 250})
        );
    }

    #[test]
    fn test_set_delays_request_from_json() {
        let req: SetDelaysRequest =
            serde_json::from_value(json!({"owner": 3, "delays": {"+": 10, "*": 0}})).unwrap();
        assert_eq!(req.owner, 3);
        assert_eq!(req.delays.get("+"), Some(&10));
        assert_eq!(req.delays.get("*"), Some(&0));
    }
}
