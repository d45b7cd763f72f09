//! Worker-side execution of a single binary operation.

use distcalc_common::protocol::jsonrpc::{
    ARITHMETIC_OVERFLOW, CAPACITY_EXCEEDED, DIVISION_BY_ZERO, SERVER_ERROR, UNKNOWN_OPERATOR,
};
use distcalc_common::{JsonRpcError, OperationRequest, Operator, OperatorError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use thiserror::Error;

use crate::limits::WorkerLimits;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecuteError {
    #[error("capacity exceeded: {max_in_flight} operations already in flight")]
    CapacityExceeded { max_in_flight: u32 },

    #[error(transparent)]
    Operator(#[from] OperatorError),

    #[error("execution aborted: {0}")]
    Aborted(String),
}

impl ExecuteError {
    /// JSON-RPC error object sent back to the orchestrator.
    pub fn to_jsonrpc(&self) -> JsonRpcError {
        let code = match self {
            ExecuteError::CapacityExceeded { .. } => CAPACITY_EXCEEDED,
            ExecuteError::Operator(OperatorError::DivisionByZero) => DIVISION_BY_ZERO,
            ExecuteError::Operator(OperatorError::UnknownOperator(_)) => UNKNOWN_OPERATOR,
            ExecuteError::Operator(OperatorError::Overflow) => ARITHMETIC_OVERFLOW,
            ExecuteError::Aborted(_) => SERVER_ERROR,
        };
        JsonRpcError::new(code, self.to_string())
    }
}

/// Releases one in-flight slot when dropped.
struct SlotGuard<'a> {
    in_flight: &'a AtomicU32,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Admission-controlled executor.
///
/// The in-flight counter is a lock-free atomic; admission is a
/// compare-and-swap so concurrent requests can never push it past the
/// configured maximum.
#[derive(Debug)]
pub struct Executor {
    max_in_flight: u32,
    in_flight: AtomicU32,
}

impl Executor {
    pub fn new(limits: &WorkerLimits) -> Self {
        Self {
            max_in_flight: limits.max_in_flight,
            in_flight: AtomicU32::new(0),
        }
    }

    fn try_acquire(&self) -> Result<SlotGuard<'_>, ExecuteError> {
        self.in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < self.max_in_flight).then_some(current + 1)
            })
            .map_err(|_| ExecuteError::CapacityExceeded {
                max_in_flight: self.max_in_flight,
            })?;
        Ok(SlotGuard {
            in_flight: &self.in_flight,
        })
    }

    /// Runs one operation: admit, wait the artificial delay, compute.
    ///
    /// An unknown operator is rejected before admission and never occupies
    /// a slot. Once admitted, the slot is released on every exit path.
    pub async fn execute(&self, request: &OperationRequest) -> Result<f64, ExecuteError> {
        let op: Operator = request.op.parse()?;
        let _slot = self.try_acquire()?;

        if request.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(request.delay_ms)).await;
        }

        Ok(op.apply(request.a, request.b)?)
    }

    /// `max_in_flight - in_flight`, never negative.
    pub fn free_capacity(&self) -> u32 {
        self.max_in_flight
            .saturating_sub(self.in_flight.load(Ordering::Acquire))
    }

    pub fn in_flight(&self) -> u32 {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn max_in_flight(&self) -> u32 {
        self.max_in_flight
    }
}
