//! # Poll model and due-time rules.
//!
//! A poll walks through three states:
//! ```text
//! Scheduled ──(starts_at)──► Open{round 1} ──(quorum | round deadline)──► Open{round n+1}
//!                                 │                                            │
//!                                 └────────(closes_at | final round ends)──────┴──► Closed
//! ```
//!
//! The due-time rules live here as pure functions of `(poll, now)` so every service
//! and test agrees on them:
//! - [`Poll::start_due`]   `Scheduled` → `starts_at`
//! - [`Poll::advance_due`] non-final open round → now on quorum, else the round deadline
//! - [`Poll::close_due`]   open poll → `closes_at` once `min_rounds` ran, or the end of the final round

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::core::DueTime;

/// Poll identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PollId(pub u64);

impl fmt::Display for PollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollState {
    /// Created, waiting for `starts_at`.
    Scheduled,
    /// Accepting votes for `round` (1-based).
    Open {
        round: u32,
        round_started_at: DateTime<Utc>,
        /// Voters of the current round.
        votes: BTreeSet<String>,
    },
    /// Finished after `rounds` rounds.
    Closed { at: DateTime<Utc>, rounds: u32 },
}

impl PollState {
    /// State of a freshly opened round.
    pub fn open(round: u32, round_started_at: DateTime<Utc>) -> Self {
        PollState::Open {
            round,
            round_started_at,
            votes: BTreeSet::new(),
        }
    }

    /// Current round, if open.
    pub fn round(&self) -> Option<u32> {
        match self {
            PollState::Open { round, .. } => Some(*round),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, PollState::Closed { .. })
    }
}

/// A poll and its timing parameters.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use chrono::Utc;
/// use alarmvisor::polls::{Poll, PollId};
///
/// let poll = Poll::new(PollId(1), "lunch", Utc::now())
///     .with_round_duration(Duration::from_secs(600))
///     .with_quorum(3)
///     .with_rounds(1, 2);
/// assert_eq!((poll.min_rounds, poll.max_rounds), (1, 2));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Poll {
    pub id: PollId,
    pub title: String,
    /// When round 1 opens.
    pub starts_at: DateTime<Utc>,
    /// Length of each round.
    pub round_duration: Duration,
    /// Votes that end a round early; `0` disables early ending.
    pub quorum: usize,
    /// Rounds that must run before `closes_at` may close the poll.
    pub min_rounds: u32,
    /// Last round; the poll closes when it ends.
    pub max_rounds: u32,
    /// Absolute deadline, honored once `min_rounds` rounds ran.
    pub closes_at: Option<DateTime<Utc>>,
    pub state: PollState,
}

impl Poll {
    /// Scheduled single-round poll with a one hour round and no quorum.
    pub fn new(id: PollId, title: impl Into<String>, starts_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            starts_at,
            round_duration: Duration::from_secs(60 * 60),
            quorum: 0,
            min_rounds: 1,
            max_rounds: 1,
            closes_at: None,
            state: PollState::Scheduled,
        }
    }

    #[must_use]
    pub fn with_round_duration(mut self, round_duration: Duration) -> Self {
        self.round_duration = round_duration;
        self
    }

    #[must_use]
    pub fn with_quorum(mut self, quorum: usize) -> Self {
        self.quorum = quorum;
        self
    }

    /// Sets the round bounds, clamped to `1 <= min <= max`.
    #[must_use]
    pub fn with_rounds(mut self, min: u32, max: u32) -> Self {
        self.min_rounds = min.max(1);
        self.max_rounds = max.max(self.min_rounds);
        self
    }

    #[must_use]
    pub fn with_closes_at(mut self, closes_at: DateTime<Utc>) -> Self {
        self.closes_at = Some(closes_at);
        self
    }

    /// End of the current round, `Never` unless open.
    pub fn round_deadline(&self) -> DueTime {
        match &self.state {
            PollState::Open {
                round_started_at, ..
            } => DueTime::after(*round_started_at, self.round_duration),
            _ => DueTime::Never,
        }
    }

    /// True when the current round collected `quorum` votes.
    pub fn has_quorum(&self) -> bool {
        match &self.state {
            PollState::Open { votes, .. } => self.quorum > 0 && votes.len() >= self.quorum,
            _ => false,
        }
    }

    /// When round 1 should open.
    pub fn start_due(&self) -> DueTime {
        match self.state {
            PollState::Scheduled => DueTime::At(self.starts_at),
            _ => DueTime::Never,
        }
    }

    /// When the current round should be replaced by the next one.
    pub fn advance_due(&self, now: DateTime<Utc>) -> DueTime {
        let Some(round) = self.state.round() else {
            return DueTime::Never;
        };
        if round >= self.max_rounds || self.deadline_reached(round, now) {
            return DueTime::Never;
        }
        if self.has_quorum() {
            return DueTime::At(now);
        }
        self.round_deadline()
    }

    /// When the poll should close.
    pub fn close_due(&self, now: DateTime<Utc>) -> DueTime {
        let Some(round) = self.state.round() else {
            return DueTime::Never;
        };
        let mut due = DueTime::Never;
        if round >= self.min_rounds
            && let Some(closes_at) = self.closes_at
        {
            due = due.min(DueTime::At(closes_at));
        }
        if round >= self.max_rounds {
            let final_round = if self.has_quorum() {
                DueTime::At(now)
            } else {
                self.round_deadline()
            };
            due = due.min(final_round);
        }
        due
    }

    fn deadline_reached(&self, round: u32, now: DateTime<Utc>) -> bool {
        round >= self.min_rounds && self.closes_at.is_some_and(|at| at <= now)
    }
}
