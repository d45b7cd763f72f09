//! # distcalc
//!
//! A distributed arithmetic expression evaluator.
//!
//! Clients submit infix expressions to an orchestrator. The orchestrator
//! converts each one to postfix, picks the registered worker with the most
//! free capacity and evaluates the expression there one binary operation at
//! a time. Workers register themselves and stay available by sending
//! heartbeats.
//!
//! This crate re-exports the workspace members:
//!
//! - [`common`]: operators, JSON-RPC protocol and HTTP transport
//! - [`metrics`]: request counters shared by both server roles
//! - [`orchestrator`]: parser, registry, load balancer and job lifecycle
//! - [`worker`]: the compute worker
//! - [`client`]: typed client for the orchestrator

pub use distcalc_client as client;
pub use distcalc_common as common;
pub use distcalc_metrics as metrics;
pub use distcalc_orchestrator as orchestrator;
pub use distcalc_worker as worker;

pub use distcalc_client::DistcalcClient;
pub use distcalc_orchestrator::{Orchestrator, OrchestratorConfig};
pub use distcalc_worker::{Worker, WorkerLimits};
