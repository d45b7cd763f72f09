//! distcalc worker
//!
//! A compute worker executes one binary operation per request. It enforces a
//! maximum number of in-flight operations, waits the requested artificial
//! delay, applies the operator and reports its free capacity to the
//! orchestrator's load balancer.

pub mod executor;
pub mod heartbeat;
pub mod http_router;
pub mod http_server;
pub mod limits;
pub mod worker;

pub use executor::{ExecuteError, Executor};
pub use heartbeat::{Heartbeat, HeartbeatConfig};
pub use http_server::HttpServer;
pub use limits::WorkerLimits;
pub use worker::Worker;
