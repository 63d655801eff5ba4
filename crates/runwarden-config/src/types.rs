//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [controller]   # worker pool, resync period, retry limit
//! [rate_limit]   # requeue backoff
//! [history]      # per-workflow run retention
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Defaults
// ─────────────────────────────────────────────────────────────────────────────

pub mod defaults {
    pub const WORKERS: usize = 2;
    pub const RESYNC_PERIOD_SECS: u64 = 300;
    pub const MAX_RETRIES: u32 = 5;
    pub const BASE_DELAY_MS: u64 = 5;
    pub const MAX_DELAY_SECS: u64 = 1000;
    pub const QPS: u32 = 10;
    pub const BURST: u32 = 100;
    pub const MAX_QUEUE_SIZE: usize = 5;
    pub const SWEEP_INTERVAL_SECS: u64 = 3600;
}

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged. Accessors fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunwardenConfig {
    /// Reconciler settings.
    pub controller: Option<ControllerSection>,

    /// Requeue rate limiting.
    pub rate_limit: Option<RateLimitSection>,

    /// Run history retention.
    pub history: Option<HistorySection>,
}

impl RunwardenConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: RunwardenConfig) {
        if other.controller.is_some() {
            self.controller = other.controller;
        }

        if other.rate_limit.is_some() {
            self.rate_limit = other.rate_limit;
        }

        if other.history.is_some() {
            self.history = other.history;
        }
    }

    /// Controller section, or defaults.
    pub fn controller(&self) -> ControllerSection {
        self.controller.clone().unwrap_or_default()
    }

    /// Rate limit section, or defaults.
    pub fn rate_limit(&self) -> RateLimitSection {
        self.rate_limit.clone().unwrap_or_default()
    }

    /// History section, or defaults.
    pub fn history(&self) -> HistorySection {
        self.history.clone().unwrap_or_default()
    }

    /// Reject values the controller cannot run with.
    pub fn validate(&self) -> Result<()> {
        let controller = self.controller();
        if controller.workers == 0 {
            return Err(ConfigError::invalid("controller.workers", "must be at least 1"));
        }
        if controller.resync_period_secs == 0 {
            return Err(ConfigError::invalid(
                "controller.resync_period_secs",
                "must be at least 1",
            ));
        }

        let rate_limit = self.rate_limit();
        if rate_limit.qps == 0 {
            return Err(ConfigError::invalid("rate_limit.qps", "must be at least 1"));
        }
        if rate_limit.burst == 0 {
            return Err(ConfigError::invalid("rate_limit.burst", "must be at least 1"));
        }
        if rate_limit.base_delay() > rate_limit.max_delay() {
            return Err(ConfigError::invalid(
                "rate_limit.base_delay_ms",
                "must not exceed max_delay_secs",
            ));
        }

        let history = self.history();
        if history.max_queue_size == 0 {
            return Err(ConfigError::invalid("history.max_queue_size", "must be at least 1"));
        }
        if history.sweep_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "history.sweep_interval_secs",
                "must be at least 1",
            ));
        }

        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// Reconciler settings (`[controller]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSection {
    /// Worker tasks per controller.
    pub workers: usize,
    /// Informer resync period; also the staleness baseline for run history.
    pub resync_period_secs: u64,
    /// Requeues before a failing key is dropped. `0` retries forever.
    pub max_retries: u32,
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            workers: defaults::WORKERS,
            resync_period_secs: defaults::RESYNC_PERIOD_SECS,
            max_retries: defaults::MAX_RETRIES,
        }
    }
}

impl ControllerSection {
    pub fn resync_period(&self) -> Duration {
        Duration::from_secs(self.resync_period_secs)
    }

    /// Retry limit, `None` when retries are unbounded.
    pub fn retry_limit(&self) -> Option<u32> {
        (self.max_retries > 0).then_some(self.max_retries)
    }
}

/// Requeue backoff settings (`[rate_limit]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSection {
    /// First per-key retry delay in milliseconds; doubles on each failure.
    pub base_delay_ms: u64,
    /// Cap on the per-key retry delay in seconds.
    pub max_delay_secs: u64,
    /// Overall requeue rate across all keys.
    pub qps: u32,
    /// Overall requeue burst across all keys.
    pub burst: u32,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            base_delay_ms: defaults::BASE_DELAY_MS,
            max_delay_secs: defaults::MAX_DELAY_SECS,
            qps: defaults::QPS,
            burst: defaults::BURST,
        }
    }
}

impl RateLimitSection {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }
}

/// Run history retention (`[history]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySection {
    /// Maximum runs retained per workflow.
    pub max_queue_size: usize,
    /// Interval between background sweeps for stale entries.
    pub sweep_interval_secs: u64,
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            max_queue_size: defaults::MAX_QUEUE_SIZE,
            sweep_interval_secs: defaults::SWEEP_INTERVAL_SECS,
        }
    }
}

impl HistorySection {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = RunwardenConfig::from_toml("").unwrap();
        assert_eq!(config.controller().workers, defaults::WORKERS);
        assert_eq!(config.controller().resync_period(), Duration::from_secs(300));
        assert_eq!(config.history().max_queue_size, defaults::MAX_QUEUE_SIZE);
        assert_eq!(config.history().sweep_interval(), Duration::from_secs(3600));
        assert_eq!(config.rate_limit().base_delay(), Duration::from_millis(5));
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_section_fills_defaults() {
        let config = RunwardenConfig::from_toml(
            r#"
[history]
max_queue_size = 20
"#,
        )
        .unwrap();
        let history = config.history();
        assert_eq!(history.max_queue_size, 20);
        assert_eq!(history.sweep_interval_secs, defaults::SWEEP_INTERVAL_SECS);
    }

    #[test]
    fn test_merge_overrides_sections() {
        let mut base = RunwardenConfig::from_toml(
            r#"
[controller]
workers = 4

[history]
max_queue_size = 10
"#,
        )
        .unwrap();
        let overlay = RunwardenConfig::from_toml(
            r#"
[history]
max_queue_size = 3
"#,
        )
        .unwrap();

        base.merge(overlay);
        assert_eq!(base.controller().workers, 4);
        assert_eq!(base.history().max_queue_size, 3);
    }

    #[test]
    fn test_retry_limit_zero_is_unbounded() {
        let section = ControllerSection {
            max_retries: 0,
            ..Default::default()
        };
        assert_eq!(section.retry_limit(), None);
        assert_eq!(ControllerSection::default().retry_limit(), Some(5));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let cases = [
            ("[controller]\nworkers = 0", "controller.workers"),
            ("[controller]\nresync_period_secs = 0", "controller.resync_period_secs"),
            ("[rate_limit]\nqps = 0", "rate_limit.qps"),
            ("[history]\nmax_queue_size = 0", "history.max_queue_size"),
            ("[history]\nsweep_interval_secs = 0", "history.sweep_interval_secs"),
        ];
        for (toml, field) in cases {
            let config = RunwardenConfig::from_toml(toml).unwrap();
            match config.validate() {
                Err(ConfigError::Invalid { field: f, .. }) => assert_eq!(f, field),
                other => panic!("expected Invalid for {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_validate_rejects_base_above_cap() {
        let config = RunwardenConfig::from_toml(
            "[rate_limit]\nbase_delay_ms = 5000\nmax_delay_secs = 1",
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip_keeps_sections() {
        let mut config = RunwardenConfig::new();
        config.history = Some(HistorySection {
            max_queue_size: 7,
            sweep_interval_secs: 60,
        });
        let text = config.to_toml().unwrap();
        assert!(text.contains("[history]"));
        assert_eq!(RunwardenConfig::from_toml(&text).unwrap(), config);
    }
}
