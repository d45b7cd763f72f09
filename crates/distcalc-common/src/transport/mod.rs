//! HTTP transport for JSON-RPC between distcalc processes.
//!
//! - **[`HttpTransport`]**: conversions between HTTP messages and JSON-RPC envelopes
//! - **[`JsonRpcClient`]**: pooled hyper client issuing one JSON-RPC call per request

pub mod http;

pub use http::{normalize_endpoint, HttpTransport, HyperRequest, HyperResponse, JsonRpcClient};
