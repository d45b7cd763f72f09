//! Admission limits for a compute worker.

/// Upper bound accepted by [`WorkerLimits::validate`].
const MAX_IN_FLIGHT_CEILING: u32 = 100_000;

/// Limits applied by the [`Executor`](crate::Executor).
///
/// # Example
///
/// ```
/// use distcalc_worker::WorkerLimits;
///
/// let limits = WorkerLimits::new().with_max_in_flight(4);
/// assert!(limits.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerLimits {
    /// Operations allowed to run at the same time; further requests are
    /// rejected with `CapacityExceeded`
    pub max_in_flight: u32,
}

impl Default for WorkerLimits {
    fn default() -> Self {
        Self { max_in_flight: 10 }
    }
}

impl WorkerLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_in_flight(mut self, max_in_flight: u32) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    /// Validates the limits.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_in_flight` is zero or above 100000.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_in_flight == 0 {
            return Err("max in-flight operations must be greater than zero".to_string());
        }

        if self.max_in_flight > MAX_IN_FLIGHT_CEILING {
            return Err(format!(
                "max in-flight operations must be <= {} (got {})",
                MAX_IN_FLIGHT_CEILING, self.max_in_flight
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = WorkerLimits::default();
        assert_eq!(limits.max_in_flight, 10);
        assert!(limits.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let limits = WorkerLimits::new().with_max_in_flight(3);
        assert_eq!(limits.max_in_flight, 3);
    }

    #[test]
    fn test_validate_zero() {
        let limits = WorkerLimits::new().with_max_in_flight(0);
        let err = limits.validate().unwrap_err();
        assert!(err.contains("greater than zero"));
    }

    #[test]
    fn test_validate_ceiling() {
        assert!(WorkerLimits::new().with_max_in_flight(100_000).validate().is_ok());
        let err = WorkerLimits::new()
            .with_max_in_flight(100_001)
            .validate()
            .unwrap_err();
        assert!(err.contains("100001"));
    }
}
