//! # Due times and the runner alarm.
//!
//! [`DueTime`] is the earliest instant an entity should be re-evaluated; [`Alarm`] is
//! the single next wake a runner keeps, plus the entity that caused it.
//!
//! ## Ordering
//! ```text
//! At(t1) < At(t2) < ... < Never        (t1 < t2)
//! ```
//! `Never` compares later than any real instant and never fires.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// When an entity becomes due.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DueTime {
    /// Due at (or after) the given wall-clock instant.
    At(DateTime<Utc>),
    /// Not due; nothing in the current state will make it due without an event.
    Never,
}

impl DueTime {
    /// Due time `after` from `now`.
    pub fn after(now: DateTime<Utc>, after: Duration) -> Self {
        match chrono::Duration::from_std(after)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
        {
            Some(at) => DueTime::At(at),
            None => DueTime::Never,
        }
    }

    /// Returns the instant, or `None` for [`DueTime::Never`].
    #[inline]
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            DueTime::At(at) => Some(*at),
            DueTime::Never => None,
        }
    }

    /// True when the due time is a real instant at or before `now`.
    #[inline]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        matches!(self, DueTime::At(at) if *at <= now)
    }

    /// True for [`DueTime::Never`].
    #[inline]
    pub fn is_never(&self) -> bool {
        matches!(self, DueTime::Never)
    }

    /// How long to sleep from `now` until due; zero when already due, `None` when never.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.instant()
            .map(|at| (at - now).to_std().unwrap_or(Duration::ZERO))
    }
}

impl From<DateTime<Utc>> for DueTime {
    fn from(at: DateTime<Utc>) -> Self {
        DueTime::At(at)
    }
}

impl From<Option<DateTime<Utc>>> for DueTime {
    fn from(at: Option<DateTime<Utc>>) -> Self {
        at.map_or(DueTime::Never, DueTime::At)
    }
}

impl fmt::Display for DueTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DueTime::At(at) => write!(f, "{}", at.to_rfc3339()),
            DueTime::Never => f.write_str("never"),
        }
    }
}

/// The runner's single next wake.
///
/// The runner never keeps a queue of all entities: the service is the source of truth
/// for which entities are due and gets asked again at every wake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alarm<Id> {
    /// When to wake.
    pub due: DueTime,
    /// Entity that set this alarm (`None` for the fallback interval).
    pub id: Option<Id>,
}

impl<Id> Alarm<Id> {
    /// An alarm that never fires.
    pub fn never() -> Self {
        Self {
            due: DueTime::Never,
            id: None,
        }
    }

    /// Fallback alarm not tied to any entity.
    pub fn fallback(due: DueTime) -> Self {
        Self { due, id: None }
    }

    /// Folds a candidate in, keeping the earliest. Returns true if the alarm moved.
    ///
    /// Ties keep the current alarm.
    pub fn offer(&mut self, due: DueTime, id: Option<Id>) -> bool {
        if due < self.due {
            self.due = due;
            self.id = id;
            true
        } else {
            false
        }
    }
}

impl<Id> Default for Alarm<Id> {
    fn default() -> Self {
        Self::never()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn never_sorts_after_every_instant() {
        let mut v = vec![DueTime::Never, DueTime::At(at(30)), DueTime::At(at(-5))];
        v.sort();
        assert_eq!(v, vec![DueTime::At(at(-5)), DueTime::At(at(30)), DueTime::Never]);
        assert!(DueTime::At(DateTime::<Utc>::MAX_UTC) < DueTime::Never);
    }

    #[test]
    fn never_is_never_due() {
        assert!(!DueTime::Never.is_due(DateTime::<Utc>::MAX_UTC));
        assert_eq!(DueTime::Never.remaining(at(0)), None);
    }

    #[test]
    fn remaining_saturates_at_zero_for_past_instants() {
        let due = DueTime::At(at(0));
        assert!(due.is_due(at(10)));
        assert_eq!(due.remaining(at(10)), Some(Duration::ZERO));
        assert_eq!(due.remaining(at(-4)), Some(Duration::from_secs(4)));
    }

    #[test]
    fn offer_keeps_the_minimum() {
        let mut alarm: Alarm<u32> = Alarm::fallback(DueTime::At(at(3600)));
        assert!(alarm.offer(DueTime::At(at(60)), Some(1)));
        assert!(!alarm.offer(DueTime::At(at(120)), Some(2)));
        assert!(!alarm.offer(DueTime::At(at(60)), Some(3)));
        assert!(!alarm.offer(DueTime::Never, Some(4)));
        assert_eq!(alarm.due, DueTime::At(at(60)));
        assert_eq!(alarm.id, Some(1));
    }

    #[test]
    fn after_overflow_becomes_never() {
        assert_eq!(
            DueTime::after(DateTime::<Utc>::MAX_UTC, Duration::from_secs(1)),
            DueTime::Never
        );
        assert_eq!(
            DueTime::after(at(0), Duration::from_secs(60)),
            DueTime::At(at(60))
        );
    }
}
