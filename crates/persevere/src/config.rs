// Retry configuration and its builder
use std::sync::Arc;
use std::time::Duration;

use crate::backoff::ExpBackoff;
use crate::budget::Budget;
use crate::constants::DEFAULT_ATTEMPTS;
use crate::error::RetryError;
use crate::jitter::Jitter;

/// Configuration for the retry engine.
///
/// The defaults invoke the operation at most 4 times with full jitter
/// over a 100ms/2s/2.0 exponential backoff, no per-attempt timeout, and
/// no budget.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of times the operation is invoked; 0 means
    /// unbounded.
    pub attempts: u32,
    /// Backoff schedule between attempts.
    pub backoff: ExpBackoff,
    /// Randomization applied to each computed delay.
    pub jitter: Jitter,
    /// Cancellation deadline for each individual attempt.
    pub attempt_timeout: Option<Duration>,
    /// Shared admission-control budget consulted before every retry.
    pub budget: Option<Arc<Budget>>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            backoff: ExpBackoff::default(),
            jitter: Jitter::Full,
            attempt_timeout: None,
            budget: None,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with validation
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Create a configuration builder (alias for `new()`)
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), RetryError> {
        if !self.backoff.factor.is_finite() || self.backoff.factor <= 0.0 {
            return Err(RetryError::InvalidConfiguration {
                message: format!(
                    "backoff factor must be greater than 0, got {}",
                    self.backoff.factor
                ),
            });
        }

        if self.backoff.base > self.backoff.max {
            return Err(RetryError::InvalidConfiguration {
                message: format!(
                    "backoff base delay {:?} exceeds max delay {:?}",
                    self.backoff.base, self.backoff.max
                ),
            });
        }

        if let Jitter::Ratio(ratio) = self.jitter {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(RetryError::InvalidConfiguration {
                    message: format!("jitter ratio must be in (0.0, 1.0], got {ratio}"),
                });
            }
        }

        Ok(())
    }
}

/// Builder for RetryConfig with fluent API
#[derive(Debug)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl Default for RetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self { config: RetryConfig::default() }
    }

    /// Cap the number of invocations; 0 retries indefinitely.
    pub fn attempts(mut self, attempts: u32) -> Self {
        self.config.attempts = attempts;
        self
    }

    pub fn exponential_backoff(mut self, base: Duration, factor: f64, max: Duration) -> Self {
        self.config.backoff = ExpBackoff { base, max, factor };
        self
    }

    pub fn no_jitter(mut self) -> Self {
        self.config.jitter = Jitter::None;
        self
    }

    pub fn full_jitter(mut self) -> Self {
        self.config.jitter = Jitter::Full;
        self
    }

    pub fn equal_jitter(mut self) -> Self {
        self.config.jitter = Jitter::Equal;
        self
    }

    pub fn jitter_ratio(mut self, ratio: f64) -> Self {
        self.config.jitter = Jitter::Ratio(ratio);
        self
    }

    /// Cancel each attempt after `timeout`; zero disables the limit.
    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.config.attempt_timeout = if timeout.is_zero() { None } else { Some(timeout) };
        self
    }

    pub fn budget(mut self, budget: Arc<Budget>) -> Self {
        self.config.budget = Some(budget);
        self
    }

    pub fn build(self) -> Result<RetryConfig, RetryError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
