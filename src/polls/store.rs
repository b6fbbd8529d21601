//! # Poll storage.
//!
//! [`PollStore`] is the source of truth the poll services query at every wake; the
//! runners never cache poll state.
//!
//! ## Rules
//! - `update` is a **compare-and-set** on the whole state: it succeeds only if the
//!   stored state still equals `expected`. Two paths racing on the same transition
//!   produce one change and one [`StoreError::Conflict`].
//! - `record_vote` only accepts votes for an open round, one per voter per round.
//!
//! [`MemoryStore`] keeps everything in a `tokio::sync::RwLock<HashMap>`.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::polls::error::StoreError;
use crate::polls::model::{Poll, PollId, PollState};

/// Async poll storage.
#[async_trait]
pub trait PollStore: Send + Sync + 'static {
    /// Stores a new poll. Fails with [`StoreError::Conflict`] if the id is taken.
    async fn insert(&self, poll: Poll) -> Result<(), StoreError>;

    /// Loads one poll.
    async fn get(&self, id: PollId) -> Result<Poll, StoreError>;

    /// Loads every poll, ordered by id.
    async fn all(&self) -> Result<Vec<Poll>, StoreError>;

    /// Replaces the state of `id` if it still equals `expected`; returns the updated poll.
    async fn update(
        &self,
        id: PollId,
        expected: &PollState,
        next: PollState,
    ) -> Result<Poll, StoreError>;

    /// Records `voter`'s vote in the current round; returns that round.
    async fn record_vote(&self, id: PollId, voter: &str) -> Result<u32, StoreError>;
}

/// In-memory [`PollStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    polls: RwLock<HashMap<PollId, Poll>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored polls.
    pub async fn len(&self) -> usize {
        self.polls.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.polls.read().await.is_empty()
    }
}

#[async_trait]
impl PollStore for MemoryStore {
    async fn insert(&self, poll: Poll) -> Result<(), StoreError> {
        let mut polls = self.polls.write().await;
        if polls.contains_key(&poll.id) {
            return Err(StoreError::Conflict(poll.id));
        }
        polls.insert(poll.id, poll);
        Ok(())
    }

    async fn get(&self, id: PollId) -> Result<Poll, StoreError> {
        self.polls
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn all(&self) -> Result<Vec<Poll>, StoreError> {
        let mut all: Vec<Poll> = self.polls.read().await.values().cloned().collect();
        all.sort_by_key(|p| p.id);
        Ok(all)
    }

    async fn update(
        &self,
        id: PollId,
        expected: &PollState,
        next: PollState,
    ) -> Result<Poll, StoreError> {
        let mut polls = self.polls.write().await;
        let poll = polls.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if &poll.state != expected {
            return Err(StoreError::Conflict(id));
        }
        poll.state = next;
        Ok(poll.clone())
    }

    async fn record_vote(&self, id: PollId, voter: &str) -> Result<u32, StoreError> {
        let mut polls = self.polls.write().await;
        let poll = polls.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        let PollState::Open { round, votes, .. } = &mut poll.state else {
            return Err(StoreError::NotOpen(id));
        };
        if !votes.insert(voter.to_string()) {
            return Err(StoreError::DuplicateVote {
                poll: id,
                round: *round,
                voter: voter.to_string(),
            });
        }
        Ok(*round)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn poll(id: u64) -> Poll {
        Poll::new(PollId(id), format!("poll {id}"), Utc::now())
    }

    #[tokio::test]
    async fn insert_rejects_taken_ids() {
        let store = MemoryStore::new();
        store.insert(poll(1)).await.unwrap();
        assert_eq!(
            store.insert(poll(1)).await,
            Err(StoreError::Conflict(PollId(1)))
        );
        assert_eq!(store.len().await, 1);
        assert_eq!(
            store.get(PollId(9)).await,
            Err(StoreError::NotFound(PollId(9)))
        );
    }

    #[tokio::test]
    async fn all_is_ordered_by_id() {
        let store = MemoryStore::new();
        for id in [3, 1, 2] {
            store.insert(poll(id)).await.unwrap();
        }
        let ids: Vec<_> = store.all().await.unwrap().iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn update_is_compare_and_set() {
        let store = MemoryStore::new();
        store.insert(poll(1)).await.unwrap();
        let open = PollState::open(1, Utc::now());

        let updated = store
            .update(PollId(1), &PollState::Scheduled, open.clone())
            .await
            .unwrap();
        assert_eq!(updated.state, open);

        let again = store
            .update(PollId(1), &PollState::Scheduled, PollState::open(1, Utc::now()))
            .await;
        assert_eq!(again, Err(StoreError::Conflict(PollId(1))));
        assert_eq!(store.get(PollId(1)).await.unwrap().state, open);
    }

    #[tokio::test]
    async fn votes_need_an_open_round_and_are_unique() {
        let store = MemoryStore::new();
        store.insert(poll(1)).await.unwrap();
        assert_eq!(
            store.record_vote(PollId(1), "ann").await,
            Err(StoreError::NotOpen(PollId(1)))
        );

        store
            .update(PollId(1), &PollState::Scheduled, PollState::open(2, Utc::now()))
            .await
            .unwrap();
        assert_eq!(store.record_vote(PollId(1), "ann").await, Ok(2));
        assert_eq!(store.record_vote(PollId(1), "bob").await, Ok(2));
        assert_eq!(
            store.record_vote(PollId(1), "ann").await,
            Err(StoreError::DuplicateVote {
                poll: PollId(1),
                round: 2,
                voter: "ann".to_string(),
            })
        );
    }
}
