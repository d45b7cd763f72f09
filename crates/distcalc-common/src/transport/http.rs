//! HTTP Transport Utilities
//!
//! Parsing JSON-RPC requests from HTTP bodies, turning JSON-RPC responses
//! into hyper responses, and the outbound [`JsonRpcClient`].
//!
//! # Example
//!
//! ```no_run
//! use distcalc_common::transport::http::JsonRpcClient;
//! use serde_json::json;
//! use std::time::Duration;
//!
//! # async fn run() -> distcalc_common::Result<()> {
//! let client = JsonRpcClient::new();
//! let free = client
//!     .call("127.0.0.1:9001", "free_capacity", json!(null), Duration::from_millis(500))
//!     .await?;
//! # Ok(())
//! # }
//! ```

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::protocol::error::{DistcalcError, Result};
use crate::protocol::requests::next_request_id;
use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};

/// Type alias for Hyper incoming requests
pub type HyperRequest = Request<Incoming>;

/// Type alias for Hyper responses with full body
pub type HyperResponse = Response<Full<Bytes>>;

/// HTTP transport utility functions
pub struct HttpTransport;

impl HttpTransport {
    /// Parse a JSON-RPC request from an HTTP body
    ///
    /// ```
    /// use distcalc_common::transport::http::HttpTransport;
    /// use hyper::body::Bytes;
    ///
    /// let body = Bytes::from(r#"{"jsonrpc":"2.0","method":"workers","id":1}"#);
    /// let request = HttpTransport::parse_jsonrpc(body).unwrap();
    /// assert_eq!(request.method, "workers");
    /// ```
    pub fn parse_jsonrpc(body: Bytes) -> Result<JsonRpcRequest> {
        serde_json::from_slice(&body).map_err(DistcalcError::JsonSerialization)
    }

    /// Create an HTTP 200 response carrying a JSON-RPC response
    pub fn to_http_response(jsonrpc: JsonRpcResponse) -> HyperResponse {
        Self::to_http_response_with_status(jsonrpc, StatusCode::OK)
    }

    /// Create an HTTP response from a JSON-RPC error
    pub fn to_http_error(id: Value, error: JsonRpcError) -> HyperResponse {
        Self::to_http_response(JsonRpcResponse::error(id, error))
    }

    /// Create an HTTP response with a custom status code
    pub fn to_http_response_with_status(jsonrpc: JsonRpcResponse, status: StatusCode) -> HyperResponse {
        let body = serde_json::to_vec(&jsonrpc).unwrap_or_default();

        let mut response = Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }

    /// Build a JSON-RPC request
    pub fn build_request(method: &str, params: Value, id: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// Turns `host:port` or a full URL into a URL ending in `/`.
///
/// Workers register under whatever address they were started with, so the
/// scheme is optional.
pub fn normalize_endpoint(addr: &str) -> String {
    let mut url = if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_string()
    } else {
        format!("http://{}", addr)
    };
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

/// Outbound JSON-RPC client over HTTP/1.1.
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Clone)]
pub struct JsonRpcClient {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl Default for JsonRpcClient {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonRpcClient {
    pub fn new() -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }

    /// Calls `method` on the server at `endpoint` and returns its `result`.
    ///
    /// The whole exchange, including reading the body, is bounded by
    /// `timeout`. A JSON-RPC error object becomes [`DistcalcError::Remote`].
    pub async fn call(
        &self,
        endpoint: &str,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value> {
        let url = normalize_endpoint(endpoint);
        let jsonrpc = HttpTransport::build_request(method, params, Value::from(next_request_id()));
        let body = serde_json::to_vec(&jsonrpc)?;

        let http_request = Request::builder()
            .method("POST")
            .uri(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| DistcalcError::InvalidRequest(format!("Failed to build request for {}: {}", url, e)))?;

        let result = match tokio::time::timeout(timeout, self.send(http_request)).await {
            Ok(result) => result,
            Err(_) => Err(DistcalcError::Timeout(timeout.as_millis() as u64)),
        };
        if let Err(e) = &result {
            debug!("JSON-RPC call {} to {} failed: {}", method, url, e);
        }
        result
    }

    async fn send(&self, http_request: Request<Full<Bytes>>) -> Result<Value> {
        let response = self
            .client
            .request(http_request)
            .await
            .map_err(|e| DistcalcError::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| DistcalcError::Transport(format!("Failed to read response: {}", e)))?
            .to_bytes();

        if !status.is_success() {
            return Err(DistcalcError::Transport(format!("HTTP status {}", status)));
        }

        let jsonrpc: JsonRpcResponse = serde_json::from_slice(&body)?;
        if let Some(error) = jsonrpc.error {
            return Err(DistcalcError::Remote {
                code: error.code,
                message: error.message,
            });
        }

        jsonrpc
            .result
            .ok_or_else(|| DistcalcError::InvalidResponse("Response missing result".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper_util::rt::TokioIo;
    use serde_json::json;
    use tokio::net::TcpListener;

    /// Serves every connection with a fixed JSON-RPC reply.
    async fn spawn_fixed_server(reply: JsonRpcResponse, status: StatusCode) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let reply = reply.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |_req: HyperRequest| {
                        let reply = reply.clone();
                        async move {
                            Ok::<_, hyper::Error>(HttpTransport::to_http_response_with_status(reply, status))
                        }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        addr
    }

    #[test]
    fn test_parse_jsonrpc_invalid_json() {
        let body = Bytes::from(r#"{"jsonrpc":"2.0","method":"test","params":}"#);
        assert!(HttpTransport::parse_jsonrpc(body).is_err());
    }

    #[test]
    fn test_to_http_response_headers() {
        let http_response = HttpTransport::to_http_error(json!(1), JsonRpcError::method_not_found());
        assert_eq!(http_response.status(), StatusCode::OK);
        assert_eq!(
            http_response.headers().get("Content-Type").unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("127.0.0.1:9001"), "http://127.0.0.1:9001/");
        assert_eq!(normalize_endpoint("http://10.0.0.2:80"), "http://10.0.0.2:80/");
        assert_eq!(normalize_endpoint("http://host:1/"), "http://host:1/");
    }

    #[tokio::test]
    async fn test_call_returns_result() {
        let addr = spawn_fixed_server(JsonRpcResponse::success(json!(1), json!(7.0)), StatusCode::OK).await;
        let client = JsonRpcClient::new();
        let value = client
            .call(&addr, "execute", json!({}), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(value, json!(7.0));
    }

    #[tokio::test]
    async fn test_call_maps_remote_error() {
        let reply = JsonRpcResponse::error(json!(1), JsonRpcError::new(-32010, "division by zero"));
        let addr = spawn_fixed_server(reply, StatusCode::OK).await;
        let err = JsonRpcClient::new()
            .call(&addr, "execute", json!({}), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.remote_code(), Some(-32010));
    }

    #[tokio::test]
    async fn test_call_rejects_non_success_status() {
        let reply = JsonRpcResponse::success(json!(1), json!(1));
        let addr = spawn_fixed_server(reply, StatusCode::INTERNAL_SERVER_ERROR).await;
        let err = JsonRpcClient::new()
            .call(&addr, "free_capacity", json!(null), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, DistcalcError::Transport(_)));
    }

    #[tokio::test]
    async fn test_call_to_closed_port_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = JsonRpcClient::new()
            .call(&addr, "free_capacity", json!(null), Duration::from_secs(2))
            .await;
        assert!(matches!(result, Err(DistcalcError::Transport(_))));
    }

    #[tokio::test]
    async fn test_call_times_out_on_silent_server() {
        // Accepts connections but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let result = JsonRpcClient::new()
            .call(&addr, "free_capacity", json!(null), Duration::from_millis(100))
            .await;
        assert!(matches!(result, Err(DistcalcError::Timeout(100))));
    }
}
