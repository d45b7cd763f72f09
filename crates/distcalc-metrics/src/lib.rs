//! distcalc metrics
//!
//! Lock-free call counters shared by workers and the orchestrator.
//!
//! - [`MetricsRegistry`]: atomic global counters plus per-method and
//!   per-worker statistics
//! - [`MetricsSnapshot`]: serializable view returned by the `_metrics` method
//! - [`ServerInfo`]: base payload of the `_info` method
//!
//! ```rust
//! use distcalc_metrics::MetricsRegistry;
//!
//! let registry = MetricsRegistry::new();
//! registry.record_method_call("+", 1200, true);
//! registry.record_method_call("/", 800, false);
//!
//! let snapshot = registry.snapshot(false);
//! assert_eq!(snapshot.total_requests, 2);
//! assert_eq!(snapshot.failed_requests, 1);
//! ```

mod registry;
mod snapshot;

pub use registry::MetricsRegistry;
pub use snapshot::{MethodMetrics, MetricsSnapshot, WorkerMetrics, ServerInfo, ServerType};
