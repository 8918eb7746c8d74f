//! Backoff schedule used while waiting on a held cache lock.
//!
//! A worker that finds another worker computing the same cache key does not
//! spin: it sleeps according to a [`RetryPolicy`] between attempts to take
//! the lock, and gives up once the attempts are exhausted.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for repeated attempts with exponential backoff.
///
/// Delays are (de)serialized as whole milliseconds so the policy reads
/// naturally from TOML:
///
/// ```toml
/// [lock_retry]
/// max_attempts = 50
/// initial_delay_ms = 5
/// max_delay_ms = 250
/// backoff_multiplier = 1.5
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Delay after the first failed attempt.
    #[serde(rename = "initial_delay_ms", with = "duration_ms")]
    pub initial_delay: Duration,

    /// Cap on any single delay.
    #[serde(rename = "max_delay_ms", with = "duration_ms")]
    pub max_delay: Duration,

    /// Each delay is `initial_delay * backoff_multiplier^(attempt-1)`, capped
    /// at `max_delay`.
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// A single attempt, no waiting.
    pub const NONE: Self = Self {
        max_attempts: 1,
        initial_delay: Duration::from_secs(0),
        max_delay: Duration::from_secs(0),
        backoff_multiplier: 1.0,
    };

    /// Waiting schedule for lock contention between workers.
    ///
    /// Starts at 5ms and grows by 1.5x up to 250ms per sleep, for roughly a
    /// minute of total patience before reporting a timeout.
    pub const LOCK_WAIT: Self = Self {
        max_attempts: 250,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(250),
        backoff_multiplier: 1.5,
    };

    pub const fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::LOCK_WAIT
        }
    }

    /// Calculate the delay before the next attempt.
    ///
    /// `attempt` is 1-indexed and names the attempt that just failed.
    /// Returns `None` once no attempts remain.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }

        let exponent = attempt.saturating_sub(1) as f64;
        let multiplier = self.backoff_multiplier.powf(exponent);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;

        Some(Duration::from_secs_f64(
            delay_secs.min(self.max_delay.as_secs_f64()),
        ))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::LOCK_WAIT
    }
}

impl From<u32> for RetryPolicy {
    fn from(max_attempts: u32) -> Self {
        Self::with_max_attempts(max_attempts)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_never_waits() {
        assert_eq!(RetryPolicy::NONE.delay_for_attempt(1), None);
    }

    #[test]
    fn test_backoff_grows_then_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            backoff_multiplier: 2.0,
        };

        assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(100)));
        assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(200)));
        assert_eq!(policy.delay_for_attempt(3), Some(Duration::from_millis(300)));
        assert_eq!(policy.delay_for_attempt(9), Some(Duration::from_millis(300)));
        assert_eq!(policy.delay_for_attempt(10), None);
    }

    #[test]
    fn test_from_attempt_count() {
        let policy: RetryPolicy = 3.into();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_delay, RetryPolicy::LOCK_WAIT.initial_delay);
    }

    #[test]
    fn test_serializes_delays_as_millis() {
        let json = serde_json::to_value(RetryPolicy::LOCK_WAIT).unwrap();
        assert_eq!(json["initial_delay_ms"], 5);
        assert_eq!(json["max_delay_ms"], 250);

        let back: RetryPolicy = serde_json::from_value(json).unwrap();
        assert_eq!(back, RetryPolicy::LOCK_WAIT);
    }
}
