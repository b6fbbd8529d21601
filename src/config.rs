//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the bus and the runners.
//!
//! Config is used in three ways:
//! 1. **Bus creation**: `Manager::new(config.bus_capacity_clamped())`
//! 2. **Runner defaults**: `RunnerConfig::from_config(&config)`
//! 3. **Poll services**: `PollScheduler::start(store, manager, &config)` reads `check_interval`
//!
//! ## Sentinel values
//! - `grace = 0s` → do not wait for runners on stop; abort immediately
//! - `check_interval = 0s` → treated as the default (1h), never a busy loop

use std::time::Duration;

use crate::policies::JitterPolicy;

/// Default fallback rescan interval.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Global configuration for buses and runners.
///
/// ## Field semantics
/// - `bus_capacity`: inbound queue size of the bus (min 1; clamped by Manager)
/// - `grace`: maximum wait for a runner to finish in-flight processing on stop
/// - `check_interval`: fallback rescan interval for services that use it
/// - `rescan_jitter`: randomization applied to every fallback wake
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the bus inbound queue.
    ///
    /// Producers wait (backpressure) when this many events are pending.
    pub bus_capacity: usize,

    /// Maximum time to wait for a runner to stop.
    ///
    /// Stop is cooperative: the runner finishes the `process_one` call in flight.
    /// Runners still busy after `grace` are aborted and reported as stuck.
    pub grace: Duration,

    /// Fallback rescan interval (periodic safety net).
    pub check_interval: Duration,

    /// Jitter for the fallback wake.
    pub rescan_jitter: JitterPolicy,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the rescan interval, substituting the default for zero.
    #[inline]
    pub fn check_interval(&self) -> Duration {
        if self.check_interval == Duration::ZERO {
            DEFAULT_CHECK_INTERVAL
        } else {
            self.check_interval
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `grace = 30s`
    /// - `check_interval = 1h`
    /// - `rescan_jitter = JitterPolicy::None`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            grace: Duration::from_secs(30),
            check_interval: DEFAULT_CHECK_INTERVAL,
            rescan_jitter: JitterPolicy::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_values_fall_back_to_safe_defaults() {
        let cfg = Config {
            bus_capacity: 0,
            check_interval: Duration::ZERO,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.check_interval(), DEFAULT_CHECK_INTERVAL);
    }
}
