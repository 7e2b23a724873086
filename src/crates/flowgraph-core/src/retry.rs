//! Retry policies - exponential backoff for transient node failures
//!
//! A [`RetryPolicy`] is attached to a graph at build time and applied by the
//! engine to every failing node execution: exponential backoff between
//! attempts, a cap on the interval, optional jitter to spread retries, and an
//! optional classifier that declares specific errors non-retryable.
//!
//! Two rules hold regardless of configuration:
//!
//! - interrupt signals are never retried - they are control flow, not
//!   failures;
//! - a `node_error` event fires for every failed attempt, so observers can
//!   watch a node being retried before it terminally fails or succeeds.
//!
//! # Example
//!
//! ```rust
//! use flowgraph_core::retry::RetryPolicy;
//!
//! // 3 attempts, 0.1s/0.2s between them, no jitter.
//! let policy = RetryPolicy::new(3)
//!     .with_initial_interval(0.1)
//!     .with_backoff_factor(2.0)
//!     .with_jitter(false);
//!
//! assert!(policy.should_retry(2));
//! assert!(!policy.should_retry(3));
//! assert_eq!(policy.calculate_delay(1).as_secs_f64(), 0.2);
//! ```

use crate::error::GraphError;
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Classifier deciding whether a given error is worth retrying
pub type RetryClassifier = Arc<dyn Fn(&GraphError) -> bool + Send + Sync>;

/// Configuration for retrying failed node executions
#[derive(Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first)
    pub max_attempts: usize,

    /// Initial interval between retries in seconds
    pub initial_interval: f64,

    /// Multiplier for the interval after each retry
    pub backoff_factor: f64,

    /// Maximum interval between retries in seconds
    pub max_interval: f64,

    /// Whether to add random jitter to intervals
    pub jitter: bool,

    /// Optional classifier; `false` makes an error terminal immediately
    retry_on: Option<RetryClassifier>,
}

impl RetryPolicy {
    /// Create a policy with the given max attempts and default backoff
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            initial_interval: 0.5,
            backoff_factor: 2.0,
            max_interval: 128.0,
            jitter: true,
            retry_on: None,
        }
    }

    /// A policy that never retries (every failure is terminal)
    pub fn none() -> Self {
        Self::new(1)
    }

    /// Set the initial interval between retries
    pub fn with_initial_interval(mut self, seconds: f64) -> Self {
        self.initial_interval = seconds;
        self
    }

    /// Set the backoff factor
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Set the maximum interval between retries
    pub fn with_max_interval(mut self, seconds: f64) -> Self {
        self.max_interval = seconds;
        self
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Install a classifier declaring which errors are retryable
    ///
    /// ```rust
    /// use flowgraph_core::retry::RetryPolicy;
    /// use flowgraph_core::GraphError;
    ///
    /// // Only retry node failures that look transient.
    /// let policy = RetryPolicy::new(5).with_retry_on(|err| match err {
    ///     GraphError::NodeError { message, .. } => message.contains("timeout"),
    ///     _ => false,
    /// });
    /// ```
    pub fn with_retry_on(
        mut self,
        classifier: impl Fn(&GraphError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.retry_on = Some(Arc::new(classifier));
        self
    }

    /// Check if more attempts are allowed after `attempt` completed ones
    pub fn should_retry(&self, attempt: usize) -> bool {
        attempt < self.max_attempts
    }

    /// Whether this particular error may be retried at all
    ///
    /// Interrupt signals are never retryable; everything else consults the
    /// classifier, defaulting to retryable.
    pub fn is_retryable(&self, error: &GraphError) -> bool {
        if error.is_interrupt() {
            return false;
        }
        match &self.retry_on {
            Some(classifier) => classifier(error),
            None => true,
        }
    }

    /// Calculate the delay before the retry following attempt number
    /// `attempt` (0-indexed)
    ///
    /// Exponential backoff `initial_interval * backoff_factor^attempt`,
    /// capped at `max_interval`, optionally scaled by a random factor in
    /// `0.5..=1.5`.
    pub fn calculate_delay(&self, attempt: usize) -> Duration {
        let base_delay = self.initial_interval * self.backoff_factor.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_interval);
        let final_delay = if self.jitter {
            let mut rng = rand::thread_rng();
            capped_delay * rng.gen_range(0.5..=1.5)
        } else {
            capped_delay
        };
        Duration::from_secs_f64(final_delay.max(0.0))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("initial_interval", &self.initial_interval)
            .field("backoff_factor", &self.backoff_factor)
            .field("max_interval", &self.max_interval)
            .field("jitter", &self.jitter)
            .field("retry_on", &self.retry_on.as_ref().map(|_| "<classifier>"))
            .finish()
    }
}
