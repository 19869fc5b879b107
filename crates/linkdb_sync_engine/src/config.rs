//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use std::time::Duration;

/// Default number of whole-table read attempts.
pub const DEFAULT_READ_ALL_ATTEMPTS: u32 = 5;
/// Default number of retries for a single address.
pub const DEFAULT_READ_ONE_RETRIES: u32 = 20;
/// Default timer for a fresh command, in ticks.
pub const DEFAULT_BASE_TIMER_TICKS: u32 = 10;
/// Default timer growth per retry, in ticks.
pub const DEFAULT_TIMER_INCREMENT_TICKS: u32 = 3;

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Wall-clock length of one tick.
    pub tick: Duration,
    /// Retry budgets and timer growth.
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Creates a configuration with one-second ticks and default budgets.
    pub fn new() -> Self {
        Self {
            tick: Duration::from_secs(1),
            retry: RetryConfig::default(),
        }
    }

    /// Sets the tick length.
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Sets the retry configuration.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Checks that the configuration can drive a pass to completion.
    pub fn validate(&self) -> SyncResult<()> {
        if self.tick.is_zero() {
            return Err(SyncError::InvalidConfig("tick must be non-zero".into()));
        }
        if self.retry.base_timer_ticks == 0 {
            return Err(SyncError::InvalidConfig(
                "base timer must be at least one tick".into(),
            ));
        }
        if self.retry.max_read_all_attempts == 0 {
            return Err(SyncError::InvalidConfig(
                "at least one whole-table attempt is required".into(),
            ));
        }
        Ok(())
    }

    /// Wall-clock duration of `ticks`.
    pub fn ticks(&self, ticks: u32) -> Duration {
        self.tick.saturating_mul(ticks)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Retry budgets and timer growth.
///
/// Whole-table reads and single-address reads have separate budgets. Every
/// timer is `base + retries * increment` ticks, so a slow device gets more
/// time on each retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Whole-table reads sent before switching to gap-directed reads.
    pub max_read_all_attempts: u32,
    /// Retries of one address before giving up on it.
    pub max_read_one_retries: u32,
    /// Timer for a fresh command, in ticks.
    pub base_timer_ticks: u32,
    /// Timer growth per retry, in ticks.
    pub timer_increment_ticks: u32,
}

impl RetryConfig {
    /// Creates a configuration with the given budgets and default timers.
    pub fn new(max_read_all_attempts: u32, max_read_one_retries: u32) -> Self {
        Self {
            max_read_all_attempts,
            max_read_one_retries,
            base_timer_ticks: DEFAULT_BASE_TIMER_TICKS,
            timer_increment_ticks: DEFAULT_TIMER_INCREMENT_TICKS,
        }
    }

    /// One whole-table attempt and no single-address retries.
    pub fn no_retry() -> Self {
        Self::new(1, 0)
    }

    /// Sets the base timer.
    #[must_use]
    pub fn with_base_timer(mut self, ticks: u32) -> Self {
        self.base_timer_ticks = ticks;
        self
    }

    /// Sets the timer increment.
    #[must_use]
    pub fn with_timer_increment(mut self, ticks: u32) -> Self {
        self.timer_increment_ticks = ticks;
        self
    }

    /// Timer in ticks for a command sent after `retries` retries.
    pub fn timer_for(&self, retries: u32) -> u32 {
        self.base_timer_ticks
            .saturating_add(retries.saturating_mul(self.timer_increment_ticks))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(DEFAULT_READ_ALL_ATTEMPTS, DEFAULT_READ_ONE_RETRIES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new()
            .with_tick(Duration::from_millis(100))
            .with_retry(RetryConfig::new(2, 4));

        assert_eq!(config.tick, Duration::from_millis(100));
        assert_eq!(config.retry.max_read_all_attempts, 2);
        assert_eq!(config.retry.max_read_one_retries, 4);
        assert_eq!(config.ticks(10), Duration::from_secs(1));
    }

    #[test]
    fn default_budgets() {
        let retry = RetryConfig::default();
        assert_eq!(retry.max_read_all_attempts, 5);
        assert_eq!(retry.max_read_one_retries, 20);
        assert_eq!(retry.base_timer_ticks, 10);
        assert_eq!(retry.timer_increment_ticks, 3);
    }

    #[test]
    fn timer_grows_per_retry() {
        let retry = RetryConfig::default();
        let timers: Vec<_> = (0..5).map(|r| retry.timer_for(r)).collect();
        assert_eq!(timers, vec![10, 13, 16, 19, 22]);
    }

    #[test]
    fn timer_saturates() {
        let retry = RetryConfig::default().with_timer_increment(u32::MAX);
        assert_eq!(retry.timer_for(2), u32::MAX);
    }

    #[test]
    fn validation() {
        assert!(SyncConfig::default().validate().is_ok());
        assert!(SyncConfig::new()
            .with_retry(RetryConfig::no_retry())
            .validate()
            .is_ok());

        let zero_tick = SyncConfig::new().with_tick(Duration::ZERO);
        assert!(matches!(
            zero_tick.validate(),
            Err(SyncError::InvalidConfig(_))
        ));

        let zero_timer = SyncConfig::new().with_retry(RetryConfig::default().with_base_timer(0));
        assert!(zero_timer.validate().is_err());

        let no_attempts = SyncConfig::new().with_retry(RetryConfig::new(0, 20));
        assert!(no_attempts.validate().is_err());
    }
}
