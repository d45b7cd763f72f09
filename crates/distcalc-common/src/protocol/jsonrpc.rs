//! JSON-RPC 2.0 Protocol Types
//!
//! Envelopes exchanged between callers, the orchestrator and the workers.
//!
//! # Error Codes
//!
//! Standard JSON-RPC 2.0 error codes:
//! - `-32700`: Parse error
//! - `-32600`: Invalid request
//! - `-32601`: Method not found
//! - `-32602`: Invalid params
//! - `-32603`: Internal error
//!
//! Application codes live in the `-32000` to `-32099` server range, see the
//! constants below.
//!
//! # Example
//!
//! ```
//! use distcalc_common::protocol::jsonrpc::{JsonRpcRequest, JsonRpcResponse, JsonRpcError};
//! use serde_json::json;
//!
//! let request = JsonRpcRequest {
//!     jsonrpc: "2.0".into(),
//!     method: "submit".into(),
//!     params: json!({"owner": 1, "expression": "2 + 2"}),
//!     id: json!(1),
//! };
//!
//! let response = JsonRpcResponse::success(json!(1), json!({"job_id": "00ff00ff00ff00ff"}));
//! let error_response = JsonRpcResponse::error(json!(1), JsonRpcError::method_not_found());
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (must be "2.0")
    pub jsonrpc: String,
    /// Name of the method to invoke
    pub method: String,
    /// Parameter values; `null` when omitted
    #[serde(default)]
    pub params: Value,
    /// Request identifier (number, string, or null)
    #[serde(default)]
    pub id: Value,
}

/// JSON-RPC 2.0 response
///
/// Exactly one of `result` and `error` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

/// JSON-RPC 2.0 error object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// Standard JSON-RPC 2.0 error codes
/// Invalid JSON was received by the server
pub const PARSE_ERROR: i32 = -32700;
/// The JSON sent is not a valid Request object
pub const INVALID_REQUEST: i32 = -32600;
/// The method does not exist / is not available
pub const METHOD_NOT_FOUND: i32 = -32601;
/// Invalid method parameter(s)
pub const INVALID_PARAMS: i32 = -32602;
/// Internal JSON-RPC error
pub const INTERNAL_ERROR: i32 = -32603;

// Application error codes
/// Generic server-side failure
pub const SERVER_ERROR: i32 = -32000;
/// Worker was asked to divide by zero
pub const DIVISION_BY_ZERO: i32 = -32010;
/// Worker is at its in-flight maximum
pub const CAPACITY_EXCEEDED: i32 = -32011;
/// Operator symbol is not in the operator table
pub const UNKNOWN_OPERATOR: i32 = -32012;
/// Operation result is not a finite number
pub const ARITHMETIC_OVERFLOW: i32 = -32013;
/// Submitted expression failed to parse
pub const INVALID_EXPRESSION: i32 = -32020;
/// No job with the requested identity
pub const JOB_NOT_FOUND: i32 = -32021;
/// Submission queue is full
pub const QUEUE_FULL: i32 = -32022;

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create a parse error (-32700)
    pub fn parse_error() -> Self {
        Self::new(PARSE_ERROR, "Parse error")
    }

    /// Create an invalid request error (-32600)
    pub fn invalid_request() -> Self {
        Self::new(INVALID_REQUEST, "Invalid Request")
    }

    /// Create a method not found error (-32601)
    pub fn method_not_found() -> Self {
        Self::new(METHOD_NOT_FOUND, "Method not found")
    }

    /// Create an invalid params error (-32602)
    pub fn invalid_params(msg: &str) -> Self {
        Self::new(INVALID_PARAMS, msg)
    }

    /// Create an internal error (-32603)
    pub fn internal_error(msg: &str) -> Self {
        Self::new(INTERNAL_ERROR, msg)
    }

    /// Create a generic server error (-32000)
    pub fn server_error(msg: &str) -> Self {
        Self::new(SERVER_ERROR, msg)
    }

    /// Attach structured data to the error.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl JsonRpcRequest {
    /// Decodes `params` into a typed payload.
    ///
    /// Failures map to an invalid-params error so routers can return them
    /// directly.
    pub fn parse_params<T: DeserializeOwned>(&self) -> Result<T, JsonRpcError> {
        serde_json::from_value(self.params.clone())
            .map_err(|e| JsonRpcError::invalid_params(&format!("Invalid params: {}", e)))
    }
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response
    pub fn error(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// Builds a response from a handler outcome.
    pub fn from_result(id: Value, result: Result<Value, JsonRpcError>) -> Self {
        match result {
            Ok(value) => Self::success(id, value),
            Err(error) => Self::error(id, error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_jsonrpc_request_serialization() {
        let req = JsonRpcRequest {
            jsonrpc: "2.0".into(),
            method: "execute".into(),
            params: json!({"op": "+"}),
            id: json!(1),
        };
        let serialized = serde_json::to_string(&req).unwrap();
        assert!(serialized.contains("\"jsonrpc\":\"2.0\""));
        assert!(serialized.contains("\"method\":\"execute\""));
        assert!(serialized.contains("\"id\":1"));
    }

    #[test]
    fn test_request_without_params_defaults_to_null() {
        let json = r#"{"jsonrpc":"2.0","method":"workers","id":7}"#;
        let req: JsonRpcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.params, Value::Null);
        assert_eq!(req.id, json!(7));
    }

    #[test]
    fn test_jsonrpc_response_error() {
        let res = JsonRpcResponse::error(json!(1), JsonRpcError::method_not_found());
        assert_eq!(res.result, None);
        assert_eq!(res.error.as_ref().map(|e| e.code), Some(METHOD_NOT_FOUND));

        let body = serde_json::to_string(&res).unwrap();
        assert!(!body.contains("\"result\""));
        assert!(body.contains("\"code\":-32601"));
    }

    #[test]
    fn test_jsonrpc_error_codes() {
        assert_eq!(JsonRpcError::parse_error().code, -32700);
        assert_eq!(JsonRpcError::invalid_request().code, -32600);
        assert_eq!(JsonRpcError::method_not_found().code, -32601);
        assert_eq!(JsonRpcError::invalid_params("test").code, -32602);
        assert_eq!(JsonRpcError::internal_error("test").code, -32603);
        assert_eq!(JsonRpcError::server_error("test").code, -32000);
    }

    #[test]
    fn test_application_codes_in_server_range() {
        for code in [
            DIVISION_BY_ZERO,
            CAPACITY_EXCEEDED,
            UNKNOWN_OPERATOR,
            INVALID_EXPRESSION,
            JOB_NOT_FOUND,
            QUEUE_FULL,
        ] {
            assert!((-32099..=-32000).contains(&code), "code {} out of range", code);
        }
    }

    #[test]
    fn test_parse_params() {
        #[derive(Deserialize)]
        struct Params {
            addr: String,
        }

        let req = JsonRpcRequest {
            jsonrpc: "2.0".into(),
            method: "register".into(),
            params: json!({"addr": "http://127.0.0.1:9001"}),
            id: json!(1),
        };
        let params: Params = req.parse_params().unwrap();
        assert_eq!(params.addr, "http://127.0.0.1:9001");

        let bad = JsonRpcRequest { params: json!({"address": 1}), ..req };
        let err = bad.parse_params::<Params>().err().unwrap();
        assert_eq!(err.code, INVALID_PARAMS);
    }

    #[test]
    fn test_jsonrpc_response_with_error_deserialization() {
        let json = r#"{"jsonrpc":"2.0","error":{"code":-32010,"message":"division by zero"},"id":1}"#;
        let res: JsonRpcResponse = serde_json::from_str(json).unwrap();
        assert_eq!(res.result, None);
        let err = res.error.unwrap();
        assert_eq!(err.code, DIVISION_BY_ZERO);
        assert_eq!(err.data, None);
    }
}
