//! distcalc orchestrator
//!
//! Parses client expressions to postfix, tracks worker liveness through
//! heartbeats, picks the worker with the most free capacity and evaluates
//! each job there, keeping job state in a [`JobStore`].

pub mod config;
pub mod delays;
pub mod error;
pub mod evaluator;
pub mod http_router;
pub mod http_server;
pub mod job;
pub mod load_balancer;
pub mod orchestrator;
pub mod parser;
pub mod queue;
pub mod registry;
pub mod store;
pub mod worker_client;

pub use config::{OrchestratorConfig, RetryConfig};
pub use delays::{DelayTable, OperatorDelays};
pub use error::{DispatchError, EvaluationError, JobError, ParseError, StartupError, StoreError};
pub use evaluator::Evaluator;
pub use http_server::HttpServer;
pub use job::{Job, JobId, JobState};
pub use load_balancer::{pick_target, LoadBalancer};
pub use orchestrator::Orchestrator;
pub use parser::{parse_to_postfix, PostfixExpression, Token};
pub use registry::{RegistrySweeper, WorkerRegistry};
pub use store::{InMemoryJobStore, JobStore};
pub use worker_client::{HttpWorkerClient, WorkerClient};
