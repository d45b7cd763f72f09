//! HTTP server for the orchestrator, built on axum.
//!
//! - `POST /` takes a JSON-RPC request
//! - `GET /__health` answers `OK`

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router};
use distcalc_common::protocol::error::{DistcalcError, Result};
use distcalc_common::transport::HttpTransport;
use distcalc_common::{JsonRpcError, JsonRpcResponse};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::http_router::OrchestratorRouter;
use crate::orchestrator::Orchestrator;

pub struct HttpServer {
    router: Arc<OrchestratorRouter>,
}

impl HttpServer {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        let router = Arc::new(OrchestratorRouter::new(orchestrator));
        Self { router }
    }

    fn app(self) -> Router {
        Router::new()
            .route("/", axum::routing::post(handle_jsonrpc))
            .route("/__health", axum::routing::get(health_check))
            .layer(CorsLayer::permissive())
            .with_state(self.router)
    }

    /// Binds to `addr` and serves until the process exits.
    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| DistcalcError::Transport(format!("Failed to bind to {}: {}", addr, e)))?;
        self.run_with_listener(listener).await
    }

    /// Serves on an already bound listener.
    pub async fn run_with_listener(self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!("Orchestrator HTTP server listening on {}", local_addr);

        axum::serve(listener, self.app())
            .await
            .map_err(|e| DistcalcError::Transport(format!("Server error: {}", e)))
    }
}

/// Malformed bodies are answered with a JSON-RPC parse error.
async fn handle_jsonrpc(
    State(router): State<Arc<OrchestratorRouter>>,
    body: Bytes,
) -> Json<JsonRpcResponse> {
    match HttpTransport::parse_jsonrpc(body) {
        Ok(request) => Json(router.handle_request(request).await),
        Err(e) => Json(JsonRpcResponse::error(
            Value::Null,
            JsonRpcError::parse_error().with_data(Value::String(e.to_string())),
        )),
    }
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
