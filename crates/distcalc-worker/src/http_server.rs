//! HTTP server for a compute worker
//!
//! Plain hyper HTTP/1.1: one tokio task per connection, JSON-RPC requests
//! accepted as `POST` bodies and handed to the [`WorkerRouter`].
//!
//! # Example
//!
//! ```no_run
//! use distcalc_worker::{HttpServer, Worker, WorkerLimits};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let worker = Arc::new(Worker::new(WorkerLimits::default()).unwrap());
//!     let server = HttpServer::new(worker);
//!     server.run("127.0.0.1:9001".parse().unwrap()).await.unwrap();
//! }
//! ```

use distcalc_common::protocol::error::DistcalcError;
use distcalc_common::transport::{HttpTransport, HyperRequest, HyperResponse};
use distcalc_common::JsonRpcError;
use http_body_util::BodyExt;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use serde_json::Value;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::http_router::WorkerRouter;
use crate::worker::Worker;

pub struct HttpServer {
    router: Arc<WorkerRouter>,
}

impl HttpServer {
    pub fn new(worker: Arc<Worker>) -> Self {
        Self {
            router: Arc::new(WorkerRouter::new(worker)),
        }
    }

    /// Binds `addr` and serves until the task is dropped.
    pub async fn run(self, addr: SocketAddr) -> Result<(), DistcalcError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| DistcalcError::Transport(format!("Failed to bind to {}: {}", addr, e)))?;
        self.run_with_listener(listener).await
    }

    /// Serves on an already bound listener.
    pub async fn run_with_listener(self, listener: TcpListener) -> Result<(), DistcalcError> {
        tracing::info!(
            "Worker HTTP server listening on {}",
            listener
                .local_addr()
                .map_err(|e| DistcalcError::Transport(format!("Failed to get local address: {}", e)))?
        );

        loop {
            let (stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            let io = TokioIo::new(stream);
            let router = self.router.clone();

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let router = router.clone();
                    async move { Ok::<_, Infallible>(Self::handle_request(router, req).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::debug!("Error serving connection: {}", err);
                }
            });
        }
    }

    async fn handle_request(router: Arc<WorkerRouter>, req: HyperRequest) -> HyperResponse {
        if req.method() != hyper::Method::POST {
            return HttpTransport::to_http_error(
                Value::Null,
                JsonRpcError::invalid_request().with_data(Value::from("only POST is supported")),
            );
        }

        let body = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                tracing::warn!("Failed to read request body: {}", e);
                return HttpTransport::to_http_error(Value::Null, JsonRpcError::invalid_request());
            }
        };

        match HttpTransport::parse_jsonrpc(body) {
            Ok(jsonrpc_req) => HttpTransport::to_http_response(router.handle_request(jsonrpc_req).await),
            Err(e) => {
                tracing::debug!("Failed to parse JSON-RPC request: {}", e);
                HttpTransport::to_http_error(Value::Null, JsonRpcError::parse_error())
            }
        }
    }
}
