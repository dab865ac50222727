//! Pool sizing and maintenance configuration

use std::time::Duration;

use crate::queue::QueueStrategy;

/// Maintenance period used when none is configured.
pub const DEFAULT_VALIDATION_INTERVAL: Duration = Duration::from_secs(67);

/// Configuration for pool sizing and background maintenance
///
/// # Examples
///
/// ```
/// use repool::PoolConfig;
/// use std::time::Duration;
///
/// let config = PoolConfig::new(2, 10, Duration::from_secs(30));
///
/// assert_eq!(config.min_idle, 2);
/// assert_eq!(config.max_idle, 10);
/// assert_eq!(config.validation_interval, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Low-water mark. A maintenance pass observing fewer idle objects
    /// than this tops the pool up toward `max_idle`.
    pub min_idle: usize,

    /// High-water mark. A maintenance pass observing more idle objects
    /// than this discards the excess.
    pub max_idle: usize,

    /// Period between maintenance passes. Must be non-zero.
    pub validation_interval: Duration,

    /// Queue implementation backing the idle set.
    pub queue_strategy: QueueStrategy,
}

impl Default for PoolConfig {
    /// Retains no idle objects: with both water marks at zero, every
    /// maintenance pass trims the idle set to empty, leaving on-demand
    /// creation with recycling only between passes.
    fn default() -> Self {
        Self {
            min_idle: 0,
            max_idle: 0,
            validation_interval: DEFAULT_VALIDATION_INTERVAL,
            queue_strategy: QueueStrategy::default(),
        }
    }
}

impl PoolConfig {
    /// Create a configuration with explicit water marks and maintenance
    /// period.
    pub fn new(min_idle: usize, max_idle: usize, validation_interval: Duration) -> Self {
        Self {
            min_idle,
            max_idle,
            validation_interval,
            ..Self::default()
        }
    }

    /// Set the low-water mark.
    pub fn with_min_idle(mut self, min_idle: usize) -> Self {
        self.min_idle = min_idle;
        self
    }

    /// Set the high-water mark.
    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Set the period between maintenance passes.
    ///
    /// # Examples
    ///
    /// ```
    /// use repool::PoolConfig;
    /// use std::time::Duration;
    ///
    /// let config = PoolConfig::default()
    ///     .with_validation_interval(Duration::from_secs(5));
    ///
    /// assert_eq!(config.validation_interval, Duration::from_secs(5));
    /// ```
    pub fn with_validation_interval(mut self, interval: Duration) -> Self {
        self.validation_interval = interval;
        self
    }

    /// Select the queue implementation backing the idle set.
    pub fn with_queue_strategy(mut self, strategy: QueueStrategy) -> Self {
        self.queue_strategy = strategy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retains_no_idle_objects() {
        let config = PoolConfig::default();
        assert_eq!(config.min_idle, 0);
        assert_eq!(config.max_idle, 0);
        assert_eq!(config.validation_interval, Duration::from_secs(67));
        assert_eq!(config.queue_strategy, QueueStrategy::BoundedArray);
    }

    #[test]
    fn builder_overrides_compose() {
        let config = PoolConfig::default()
            .with_min_idle(3)
            .with_max_idle(9)
            .with_validation_interval(Duration::from_secs(1))
            .with_queue_strategy(QueueStrategy::UnboundedLinked);

        assert_eq!(config.min_idle, 3);
        assert_eq!(config.max_idle, 9);
        assert_eq!(config.validation_interval, Duration::from_secs(1));
        assert_eq!(config.queue_strategy, QueueStrategy::UnboundedLinked);
    }
}
