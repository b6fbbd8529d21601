//! # Per-runner configuration.

use std::sync::Arc;

use crate::config::Config;
use crate::core::clock::{Clock, SystemClock};
use crate::policies::JitterPolicy;

/// Settings for one [`ServiceRunner`](crate::ServiceRunner).
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Source of "now" for due-time comparisons.
    pub clock: Arc<dyn Clock>,
    /// Jitter applied to the fallback rescan wake.
    pub rescan_jitter: JitterPolicy,
}

impl RunnerConfig {
    /// Runner settings derived from the global [`Config`], using the system clock.
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            clock: Arc::new(SystemClock),
            rescan_jitter: cfg.rescan_jitter,
        }
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
