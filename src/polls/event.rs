//! # Poll domain events.
//!
//! Every state change of a poll is published as one [`PollEvent`] on the poll bus.
//! The poll services listen to the variants that can move their due times earlier:
//!
//! | Event           | Emitted by             | Relevant to           |
//! |-----------------|------------------------|-----------------------|
//! | `Created`       | `create_poll`          | start                 |
//! | `Started`       | start service          | advance, close        |
//! | `VoteCast`      | `cast_vote`            | advance, close        |
//! | `RoundAdvanced` | advance service        | close                 |
//! | `Closed`        | close service          | (observers only)      |

use crate::polls::model::PollId;

/// Poll lifecycle event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollEvent {
    /// A poll was stored in `Scheduled` state.
    Created { poll: PollId },
    /// Round 1 opened.
    Started { poll: PollId, round: u32 },
    /// A vote was recorded for `round`.
    VoteCast {
        poll: PollId,
        round: u32,
        voter: String,
    },
    /// `round` opened, replacing the previous one.
    RoundAdvanced { poll: PollId, round: u32 },
    /// The poll closed after `rounds` rounds.
    Closed { poll: PollId, rounds: u32 },
}

impl PollEvent {
    /// Poll this event is about.
    pub fn poll(&self) -> PollId {
        match self {
            PollEvent::Created { poll }
            | PollEvent::Started { poll, .. }
            | PollEvent::VoteCast { poll, .. }
            | PollEvent::RoundAdvanced { poll, .. }
            | PollEvent::Closed { poll, .. } => *poll,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            PollEvent::Created { .. } => "poll_created",
            PollEvent::Started { .. } => "poll_started",
            PollEvent::VoteCast { .. } => "poll_vote_cast",
            PollEvent::RoundAdvanced { .. } => "poll_round_advanced",
            PollEvent::Closed { .. } => "poll_closed",
        }
    }
}
