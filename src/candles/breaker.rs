// Circuit breaker: consecutive infrastructure failures open the circuit

use crate::candles::types::{CandleError, CandleResult};
use crate::logger::{self, LogTag};
use std::sync::atomic::{AtomicU32, Ordering};

/// Failure-counting gate shared by every worker of one engine instance.
/// Only genuine infrastructure failures count; expected "no data for this
/// asset" answers never trip it.
pub struct CircuitBreaker {
    failures: AtomicU32,
    threshold: u32,
}

impl CircuitBreaker {
    pub fn new(threshold: u32) -> Self {
        Self {
            failures: AtomicU32::new(0),
            threshold,
        }
    }

    /// Refuse immediately when open; called before any network attempt
    pub fn check(&self) -> CandleResult<()> {
        let failures = self.failures.load(Ordering::SeqCst);
        if failures >= self.threshold {
            return Err(CandleError::CircuitOpen { failures });
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.failures.load(Ordering::SeqCst) >= self.threshold
    }

    /// Any successful fetch closes the circuit again
    pub fn record_success(&self) {
        self.failures.store(0, Ordering::SeqCst);
    }

    /// Returns the new consecutive failure count
    pub fn record_failure(&self) -> u32 {
        let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures == self.threshold {
            logger::warning(
                LogTag::Breaker,
                &format!("circuit opened after {} consecutive failures", failures),
            );
        }
        failures
    }

    /// Operator action: close the circuit explicitly
    pub fn reset(&self) {
        self.failures.store(0, Ordering::SeqCst);
    }

    pub fn failure_count(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opens_at_threshold() {
        let breaker = CircuitBreaker::new(3);
        assert!(breaker.check().is_ok());

        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.check().is_ok());
        assert!(!breaker.is_open());

        breaker.record_failure();
        assert!(breaker.is_open());
        match breaker.check() {
            Err(CandleError::CircuitOpen { failures }) => assert_eq!(failures, 3),
            other => panic!("expected CircuitOpen, got {:?}", other),
        }
    }

    #[test]
    fn test_success_resets_counter() {
        let breaker = CircuitBreaker::new(3);
        breaker.record_failure();
        breaker.record_failure();

        breaker.record_success();
        assert_eq!(breaker.failure_count(), 0);

        // The full threshold is needed again after a success
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.check().is_ok());
        breaker.record_failure();
        assert!(breaker.check().is_err());
    }

    #[test]
    fn test_explicit_reset() {
        let breaker = CircuitBreaker::new(1);
        breaker.record_failure();
        assert!(breaker.is_open());

        breaker.reset();
        assert!(breaker.check().is_ok());
    }
}
