//! Errors of the poll layer.
//!
//! - [`StoreError`] data-access failures of a [`PollStore`](crate::polls::PollStore).
//! - [`PollError`] failures of the user-facing operations (`create_poll`, `cast_vote`).

use thiserror::Error;

use crate::error::BusError;
use crate::polls::model::PollId;

/// # Errors produced by a poll store.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No poll with this id.
    #[error("poll {0} not found")]
    NotFound(PollId),

    /// The stored state differs from the expected one (or the id is taken on insert).
    #[error("poll {0} was modified concurrently")]
    Conflict(PollId),

    /// Votes are only accepted while a round is open.
    #[error("poll {0} is not open")]
    NotOpen(PollId),

    /// The voter already voted in the current round.
    #[error("{voter} already voted in round {round} of poll {poll}")]
    DuplicateVote {
        poll: PollId,
        round: u32,
        voter: String,
    },
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "store_not_found",
            StoreError::Conflict(_) => "store_conflict",
            StoreError::NotOpen(_) => "store_not_open",
            StoreError::DuplicateVote { .. } => "store_duplicate_vote",
        }
    }
}

/// # Errors returned by poll operations.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The change was stored but its event could not be published.
    #[error("event not published: {0}")]
    Bus(#[from] BusError),
}
