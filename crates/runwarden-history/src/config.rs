//! Configuration for the run history store.

use std::time::Duration;

/// Default number of runs retained per workflow.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 5;

/// Default resync period of the run informer.
pub const DEFAULT_RESYNC_PERIOD: Duration = Duration::from_secs(300);

/// Default interval between stale-entry sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Configuration for the run history store.
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Maximum runs retained per workflow before the oldest is evicted.
    pub max_queue_size: usize,

    /// Resync period of the informer that refreshes entries.
    /// Entries not refreshed for twice this long are considered gone.
    pub resync_period: Duration,

    /// Interval for the background sweep.
    pub sweep_interval: Duration,

    /// Whether to spawn the background sweep on construction.
    pub enable_sweep_task: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            resync_period: DEFAULT_RESYNC_PERIOD,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            enable_sweep_task: true,
        }
    }
}

impl HistoryConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum runs retained per workflow.
    pub fn with_max_queue_size(mut self, max: usize) -> Self {
        self.max_queue_size = max;
        self
    }

    /// Set the resync period used as the staleness baseline.
    pub fn with_resync_period(mut self, period: Duration) -> Self {
        self.resync_period = period;
        self
    }

    /// Set the sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Enable or disable the background sweep task.
    pub fn with_sweep_task(mut self, enabled: bool) -> Self {
        self.enable_sweep_task = enabled;
        self
    }

    /// Age past which an unrefreshed entry is swept.
    pub fn staleness_threshold(&self) -> Duration {
        self.resync_period.saturating_mul(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HistoryConfig::default();
        assert_eq!(config.max_queue_size, DEFAULT_MAX_QUEUE_SIZE);
        assert_eq!(config.sweep_interval, Duration::from_secs(3600));
        assert!(config.enable_sweep_task);
    }

    #[test]
    fn test_staleness_is_twice_resync() {
        let config = HistoryConfig::new().with_resync_period(Duration::from_secs(90));
        assert_eq!(config.staleness_threshold(), Duration::from_secs(180));
    }
}
