//! # Jitter policy for periodic rescans.
//!
//! [`JitterPolicy`] randomizes the fallback rescan interval so that many runners
//! started together do not all run their full `check_all` pass at the same instant.
//!
//! - [`JitterPolicy::None`]: exact interval, predictable wakes
//! - [`JitterPolicy::Full`]: random interval in [0, interval] (most aggressive)
//! - [`JitterPolicy::Equal`]: interval/2 + random[0, interval/2] (balanced)
//!
//! Jitter only ever shortens the fallback interval; it is never applied to a real
//! due time reported by a service.

use rand::Rng;
use std::time::Duration;

/// Policy controlling randomization of the rescan interval.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// No jitter: rescan exactly every interval.
    ///
    /// Use when:
    /// - Only one runner hits the store
    /// - Testing/debugging
    #[default]
    None,

    /// Full jitter: random interval in [0, interval].
    Full,

    /// Equal jitter: interval/2 + random[0, interval/2].
    ///
    /// Keeps rescans reasonably regular while spreading them out.
    Equal,
}

impl JitterPolicy {
    /// Applies jitter to the given interval.
    pub fn apply(&self, interval: Duration) -> Duration {
        match self {
            JitterPolicy::None => interval,
            JitterPolicy::Full => pick_between(Duration::ZERO, interval),
            JitterPolicy::Equal => pick_between(interval / 2, interval),
        }
    }
}

/// Uniform pick in `[floor, interval]` at millisecond resolution.
fn pick_between(floor: Duration, interval: Duration) -> Duration {
    let hi = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
    let lo = u64::try_from(floor.as_millis()).unwrap_or(u64::MAX).min(hi);
    if lo == hi {
        return Duration::from_millis(hi);
    }
    Duration::from_millis(rand::rng().random_range(lo..=hi))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_exact() {
        let d = Duration::from_secs(3600);
        assert_eq!(JitterPolicy::None.apply(d), d);
    }

    #[test]
    fn full_jitter_stays_within_interval() {
        let d = Duration::from_millis(1000);
        for _ in 0..200 {
            assert!(JitterPolicy::Full.apply(d) <= d);
        }
    }

    #[test]
    fn equal_jitter_keeps_at_least_half() {
        let d = Duration::from_millis(1000);
        for _ in 0..200 {
            let j = JitterPolicy::Equal.apply(d);
            assert!(j >= Duration::from_millis(500), "{j:?} below half");
            assert!(j <= d, "{j:?} above interval");
        }
    }

    #[test]
    fn sub_millisecond_interval_is_not_stretched() {
        let d = Duration::from_micros(900);
        assert_eq!(JitterPolicy::Full.apply(d), Duration::ZERO);
        assert_eq!(JitterPolicy::Equal.apply(d), Duration::ZERO);
    }

    #[test]
    fn zero_interval_stays_zero() {
        assert_eq!(JitterPolicy::Full.apply(Duration::ZERO), Duration::ZERO);
        assert_eq!(JitterPolicy::Equal.apply(Duration::ZERO), Duration::ZERO);
    }
}
