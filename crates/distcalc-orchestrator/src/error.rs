//! Error types raised by the orchestrator.

use distcalc_common::protocol::jsonrpc::{
    self, JsonRpcError, DIVISION_BY_ZERO, INVALID_EXPRESSION, JOB_NOT_FOUND, QUEUE_FULL,
    UNKNOWN_OPERATOR,
};
use distcalc_common::{DistcalcError, Operator};
use thiserror::Error;

/// Rejection of an infix expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown operand '{symbol}' at position {position}")]
    UnknownOperand { symbol: char, position: usize },

    #[error("unmatched opening parenthesis")]
    UnmatchedOpenParen,

    #[error("unmatched closing parenthesis at position {position}")]
    UnmatchedCloseParen { position: usize },

    /// Operands and binary operators do not balance to a single value.
    #[error("operand count mismatch: expression leaves {pending} values instead of 1")]
    OperandCountMismatch { pending: i64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("no available worker")]
    NoAvailableWorker,
}

/// Failure while walking a postfix expression against a worker.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("division by zero")]
    DivisionByZero,

    /// A literal or an intermediate result left the finite `f64` range.
    #[error("arithmetic overflow")]
    Overflow,

    #[error("worker {worker} is at capacity")]
    CapacityExceeded { worker: String },

    #[error("worker {worker} rejected operator: {message}")]
    UnknownOperator { worker: String, message: String },

    #[error("no delay configured for operator '{0}'")]
    MissingDelay(Operator),

    #[error("malformed postfix expression: {0}")]
    Malformed(String),

    /// Transport failure, timeout or any other worker-side error.
    #[error("worker {worker} failed: {message}")]
    Worker { worker: String, message: String },
}

impl EvaluationError {
    /// Classifies a failed `execute` call by its JSON-RPC error code.
    pub fn from_worker(worker: &str, err: DistcalcError) -> Self {
        let worker = worker.to_string();
        match (err.remote_code(), err) {
            (Some(DIVISION_BY_ZERO), _) => EvaluationError::DivisionByZero,
            (Some(jsonrpc::ARITHMETIC_OVERFLOW), _) => EvaluationError::Overflow,
            (Some(jsonrpc::CAPACITY_EXCEEDED), _) => EvaluationError::CapacityExceeded { worker },
            (Some(UNKNOWN_OPERATOR), DistcalcError::Remote { message, .. }) => {
                EvaluationError::UnknownOperator { worker, message }
            }
            (_, err) => EvaluationError::Worker {
                worker,
                message: err.to_string(),
            },
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("job store unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced to clients of the orchestrator.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("invalid expression: {0}")]
    Parse(#[from] ParseError),

    #[error("job {0} not found")]
    NotFound(String),

    #[error("invalid job id '{0}'")]
    InvalidJobId(String),

    #[error("submission queue is full")]
    QueueFull,

    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl JobError {
    pub fn to_jsonrpc(&self) -> JsonRpcError {
        let message = self.to_string();
        match self {
            JobError::Parse(_) => JsonRpcError::new(INVALID_EXPRESSION, message),
            JobError::NotFound(_) => JsonRpcError::new(JOB_NOT_FOUND, message),
            JobError::InvalidJobId(_) => JsonRpcError::invalid_params(&message),
            JobError::QueueFull => JsonRpcError::new(QUEUE_FULL, message),
            JobError::UnknownOperator(_) => JsonRpcError::new(UNKNOWN_OPERATOR, message),
            JobError::Store(_) => JsonRpcError::internal_error(&message),
        }
    }
}

/// Reasons the orchestrator refuses to start.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("invalid orchestrator configuration: {0}")]
    InvalidConfig(String),

    /// Unfinished jobs could not be loaded back.
    #[error("failed to recover jobs: {0}")]
    Recovery(#[from] StoreError),
}
