//! Reconnect backoff policy.
//!
//! The supervisor schedules a reconnect after an unexpected session loss
//! using exponential backoff: the delay starts small, doubles per failed
//! cycle, and is capped. A successful session resets the ladder.

use std::time::Duration;

use crate::error::{Error, Result};

/// Configuration for the reconnect delay ladder.
#[derive(Debug, Clone)]
pub struct ReconnectOptions {
    /// Delay before the first reconnect attempt.
    pub initial_delay: Duration,
    /// Ceiling for the delay between attempts.
    pub max_delay: Duration,
    /// Multiplier applied after each scheduled attempt.
    pub backoff_multiplier: f64,
}

impl Default for ReconnectOptions {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(2000),
            max_delay: Duration::from_millis(32_000),
            backoff_multiplier: 2.0,
        }
    }
}

impl ReconnectOptions {
    /// Create options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the delay before the first attempt.
    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the delay ceiling.
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff multiplier.
    #[must_use]
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Validate the options and return an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.backoff_multiplier < 1.0 {
            return Err(Error::invalid_config("backoff_multiplier must be >= 1.0"));
        }
        if self.initial_delay.is_zero() {
            return Err(Error::invalid_config("initial_delay must be > 0"));
        }
        if self.max_delay < self.initial_delay {
            return Err(Error::invalid_config("max_delay must be >= initial_delay"));
        }
        Ok(())
    }
}

/// Stateful backoff ladder derived from [`ReconnectOptions`].
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    options: ReconnectOptions,
    current: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(ReconnectOptions::default())
    }
}

impl ReconnectPolicy {
    /// Create a policy positioned at the initial delay.
    #[must_use]
    pub fn new(options: ReconnectOptions) -> Self {
        let current = options.initial_delay;
        Self { options, current }
    }

    /// The delay to wait before the next attempt, advancing the ladder.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        let next_ms = self.current.as_millis() as f64 * self.options.backoff_multiplier;
        self.current = Duration::from_millis(next_ms as u64).min(self.options.max_delay);
        delay
    }

    /// The delay the next call to [`next_delay`](Self::next_delay) would
    /// return, without advancing.
    #[must_use]
    pub fn peek_delay(&self) -> Duration {
        self.current
    }

    /// Return to the initial delay. Called after a successful session.
    pub fn reset(&mut self) {
        self.current = self.options.initial_delay;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_up_to_the_cap() {
        let mut policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (0..6).map(|_| policy.next_delay().as_millis() as u64).collect();
        assert_eq!(delays, vec![2000, 4000, 8000, 16_000, 32_000, 32_000]);
    }

    #[test]
    fn reset_returns_to_initial() {
        let mut policy = ReconnectPolicy::default();
        policy.next_delay();
        policy.next_delay();
        policy.reset();
        assert_eq!(policy.next_delay(), Duration::from_millis(2000));
    }

    #[test]
    fn peek_does_not_advance() {
        let mut policy = ReconnectPolicy::default();
        assert_eq!(policy.peek_delay(), Duration::from_millis(2000));
        assert_eq!(policy.peek_delay(), Duration::from_millis(2000));
        assert_eq!(policy.next_delay(), Duration::from_millis(2000));
        assert_eq!(policy.peek_delay(), Duration::from_millis(4000));
    }

    #[test]
    fn custom_options_respected() {
        let options = ReconnectOptions::new()
            .initial_delay(Duration::from_millis(500))
            .max_delay(Duration::from_millis(1500))
            .backoff_multiplier(3.0);
        let mut policy = ReconnectPolicy::new(options);
        assert_eq!(policy.next_delay(), Duration::from_millis(500));
        assert_eq!(policy.next_delay(), Duration::from_millis(1500));
        assert_eq!(policy.next_delay(), Duration::from_millis(1500));
    }

    #[test]
    fn validation_rejects_bad_options() {
        assert!(
            ReconnectOptions::new()
                .backoff_multiplier(0.5)
                .validate()
                .is_err()
        );
        assert!(
            ReconnectOptions::new()
                .initial_delay(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(
            ReconnectOptions::new()
                .max_delay(Duration::from_millis(1))
                .validate()
                .is_err()
        );
        assert!(ReconnectOptions::new().validate().is_ok());
    }
}
