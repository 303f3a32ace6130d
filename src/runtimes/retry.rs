//! Per-node retry and cache policies.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::node::NodeError;

/// Which node errors a retry policy applies to.
#[derive(Clone, Default)]
pub enum RetryOn {
    /// Retry every error (interrupts excepted; a pause is not a failure).
    #[default]
    Any,
    /// Retry only errors the predicate accepts.
    Predicate(Arc<dyn Fn(&NodeError) -> bool + Send + Sync>),
}

impl fmt::Debug for RetryOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryOn::Any => f.write_str("RetryOn::Any"),
            RetryOn::Predicate(_) => f.write_str("RetryOn::Predicate(..)"),
        }
    }
}

/// Exponential backoff with optional jitter for a single node's calls.
///
/// The call is attempted up to `max_attempts` times; between attempts the
/// executor sleeps `interval_for(attempt)`:
///
/// ```text
/// raw      = initial_interval * backoff_factor ^ attempt
/// interval = min(raw, max_interval)  (+ uniform(0,1) * interval * 0.1 with jitter)
/// ```
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub backoff_factor: f64,
    pub max_interval: Duration,
    pub jitter: bool,
    pub retry_on: RetryOn,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_interval: Duration::from_secs(128),
            jitter: true,
            retry_on: RetryOn::Any,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    #[must_use]
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    #[must_use]
    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    #[must_use]
    pub fn retry_on<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&NodeError) -> bool + Send + Sync + 'static,
    {
        self.retry_on = RetryOn::Predicate(Arc::new(predicate));
        self
    }

    /// Sleep interval before retrying after `attempt` failed attempts.
    #[must_use]
    pub fn interval_for(&self, attempt: u32) -> Duration {
        let raw = self.initial_interval.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let mut secs = raw.min(self.max_interval.as_secs_f64());
        if self.jitter {
            secs += rand::random::<f64>() * secs * 0.1;
        }
        Duration::from_secs_f64(secs)
    }

    /// Whether `error` should be retried under this policy.
    #[must_use]
    pub fn should_retry(&self, error: &NodeError) -> bool {
        if matches!(error, NodeError::Interrupted(_)) {
            return false;
        }
        match &self.retry_on {
            RetryOn::Any => true,
            RetryOn::Predicate(predicate) => predicate(error),
        }
    }
}

/// Reserved per-node cache policy.
///
/// Accepted and stored on the node spec; cache-aware execution is not part
/// of the engine yet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CachePolicy {
    /// How long a cached result stays valid.
    pub ttl: Option<Duration>,
    /// State fields participating in the cache key.
    pub key_fields: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_backs_off_and_caps() {
        let policy = RetryPolicy::new(5)
            .with_initial_interval(Duration::from_secs(1))
            .with_backoff_factor(10.0)
            .with_max_interval(Duration::from_secs(30))
            .with_jitter(false);
        assert_eq!(policy.interval_for(0), Duration::from_secs(1));
        assert_eq!(policy.interval_for(1), Duration::from_secs(10));
        assert_eq!(policy.interval_for(2), Duration::from_secs(30));
        assert_eq!(policy.interval_for(6), Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let policy = RetryPolicy::new(3)
            .with_initial_interval(Duration::from_secs(10))
            .with_jitter(true);
        for _ in 0..64 {
            let interval = policy.interval_for(0).as_secs_f64();
            assert!((10.0..=11.0).contains(&interval));
        }
    }

    #[test]
    fn predicate_gates_retries() {
        let policy = RetryPolicy::new(3)
            .retry_on(|e| matches!(e, NodeError::Provider { .. }));
        assert!(policy.should_retry(&NodeError::Provider {
            provider: "llm",
            message: "overloaded".into(),
        }));
        assert!(!policy.should_retry(&NodeError::ValidationFailed("bad".into())));
    }
}
