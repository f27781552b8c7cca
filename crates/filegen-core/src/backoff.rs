//! Redial delay for source connections

use std::time::Duration;

use crate::config::BackoffConfig;

/// Doubling delay capped at a ceiling
///
/// [`next_delay`](Self::next_delay) is taken after each failed dial;
/// [`reset`](Self::reset) after each successful connect.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        let initial = config.initial.min(config.max);
        Self {
            initial,
            max: config.max,
            current: initial,
        }
    }

    /// Delay to wait now; doubles the following one up to the ceiling
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    /// Delay the next call to [`next_delay`](Self::next_delay) will return
    #[must_use]
    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff(initial_ms: u64, max_ms: u64) -> Backoff {
        Backoff::new(BackoffConfig {
            initial: Duration::from_millis(initial_ms),
            max: Duration::from_millis(max_ms),
        })
    }

    #[test]
    fn test_doubles_until_ceiling() {
        let mut backoff = backoff(100, 1000);
        let delays: Vec<u64> = (0..7)
            .map(|_| backoff.next_delay().as_millis() as u64)
            .collect();

        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000, 1000]);
    }

    #[test]
    fn test_reset_returns_to_initial() {
        let mut backoff = backoff(100, 60_000);
        for _ in 0..10 {
            backoff.next_delay();
        }

        backoff.reset();

        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_initial_above_ceiling_is_clamped() {
        let mut backoff = backoff(5000, 1000);
        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
    }
}
