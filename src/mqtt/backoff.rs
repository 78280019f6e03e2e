//! Retry policy for broker connection attempts.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay between failed broker connection attempts.
///
/// The default reproduces the fixed 5 second retry with no attempt cap.
/// Setting `multiplier` above 1 grows the delay per consecutive failure up to
/// `max_delay_ms`; `max_attempts` turns an unreachable broker into a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    pub initial_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_ms: 5000,
            multiplier: 1.0,
            max_delay_ms: 5000,
            max_attempts: None,
        }
    }
}

impl BackoffPolicy {
    /// Delay after the `failures`-th consecutive failure (1-based).
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(32) as i32;
        let grown = self.initial_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        let cap = self.max_delay_ms.max(self.initial_ms) as f64;
        Duration::from_millis(grown.min(cap) as u64)
    }

    pub fn is_exhausted(&self, failures: u32) -> bool {
        matches!(self.max_attempts, Some(max) if failures >= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_fixed_five_seconds_without_cap() {
        let policy = BackoffPolicy::default();
        for failures in [1, 2, 10, 1000] {
            assert_eq!(policy.delay_for(failures), Duration::from_secs(5));
            assert!(!policy.is_exhausted(failures));
        }
    }

    #[test]
    fn exponential_growth_is_capped() {
        let policy = BackoffPolicy {
            initial_ms: 1000,
            multiplier: 2.0,
            max_delay_ms: 6000,
            max_attempts: Some(4),
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(6));
        assert_eq!(policy.delay_for(40), Duration::from_secs(6));
        assert!(!policy.is_exhausted(3));
        assert!(policy.is_exhausted(4));
    }
}
