//! distcalc common types and transport
//!
//! Shared building blocks for the orchestrator, the compute workers and the
//! client:
//!
//! - [`operator`]: the closed operator table (symbols, precedence, apply)
//! - [`protocol`]: JSON-RPC 2.0 envelopes, request/response payloads, errors
//! - [`transport`]: HTTP helpers and the JSON-RPC client used between processes
//!
//! # Example
//!
//! ```
//! use distcalc_common::operator::Operator;
//!
//! let op = Operator::from_symbol('*').unwrap();
//! assert_eq!(op.apply(6.0, 7.0).unwrap(), 42.0);
//! assert_eq!(op.precedence(), 2);
//! ```

pub mod operator;
pub mod protocol;
pub mod transport;

pub use operator::{Grouping, Operator, OperatorError, Symbol};
pub use protocol::*;
