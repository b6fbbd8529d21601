//! # Poll services.
//!
//! One [`Service`](crate::Service) per transition, each driven by its own runner:
//!
//! - [`StartPollService`]   `Scheduled` → `Open{1}`, emits `Started`
//! - [`AdvanceRoundService`] `Open{n}` → `Open{n+1}`, emits `RoundAdvanced`
//! - [`ClosePollService`]   `Open{n}` → `Closed`, emits `Closed`
//!
//! All three share a [`PollContext`]: store, bus, clock and rescan interval.
//! Processing re-reads the poll, re-checks its due rule and applies the transition
//! with a compare-and-set; a poll another path already moved yields
//! [`Processed::NothingToDoYet`](crate::Processed::NothingToDoYet).

mod advance;
mod close;
mod start;

pub use advance::AdvanceRoundService;
pub use close::ClosePollService;
pub use start::StartPollService;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use tracing::{debug, warn};

use crate::core::{Clock, DueStream, DueTime};
use crate::error::ServiceError;
use crate::events::Manager;
use crate::polls::error::StoreError;
use crate::polls::event::PollEvent;
use crate::polls::model::{Poll, PollId, PollState};
use crate::polls::store::PollStore;

/// Due-time rule of one service.
type DueRule = fn(&Poll, DateTime<Utc>) -> DueTime;

/// Dependencies shared by the poll services.
#[derive(Clone)]
pub struct PollContext {
    store: Arc<dyn PollStore>,
    bus: Manager<PollEvent>,
    clock: Arc<dyn Clock>,
    check_interval: Duration,
}

impl std::fmt::Debug for PollContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollContext")
            .field("bus", &self.bus)
            .field("clock", &self.clock)
            .field("check_interval", &self.check_interval)
            .finish_non_exhaustive()
    }
}

impl PollContext {
    pub fn new(
        store: Arc<dyn PollStore>,
        bus: Manager<PollEvent>,
        clock: Arc<dyn Clock>,
        check_interval: Duration,
    ) -> Self {
        Self {
            store,
            bus,
            clock,
            check_interval,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// One pass over every stored poll.
    fn scan(&self, rule: DueRule) -> DueStream<'_, PollId> {
        stream::once(async move {
            let now = self.now();
            match self.store.all().await {
                Ok(polls) => polls
                    .iter()
                    .map(|poll| Ok((poll.id, rule(poll, now))))
                    .collect::<Vec<_>>(),
                Err(err) => vec![Err(ServiceError::store(err))],
            }
        })
        .flat_map(stream::iter)
        .boxed()
    }

    /// Due time of one poll; a poll that no longer exists is never due.
    async fn check(&self, id: PollId, rule: DueRule) -> Result<DueTime, ServiceError> {
        match self.store.get(id).await {
            Ok(poll) => Ok(rule(&poll, self.now())),
            Err(StoreError::NotFound(_)) => Ok(DueTime::Never),
            Err(err) => Err(ServiceError::store(err)),
        }
    }

    /// Loads `id` if `rule` says it is due now.
    async fn load_due(
        &self,
        id: PollId,
        rule: DueRule,
    ) -> Result<Option<(Poll, DateTime<Utc>)>, ServiceError> {
        let poll = match self.store.get(id).await {
            Ok(poll) => poll,
            Err(StoreError::NotFound(_)) => return Ok(None),
            Err(err) => return Err(ServiceError::store(err)),
        };
        let now = self.now();
        if rule(&poll, now).is_due(now) {
            Ok(Some((poll, now)))
        } else {
            Ok(None)
        }
    }

    /// Compare-and-set transition; `false` when another path got there first.
    async fn transition(&self, poll: &Poll, next: PollState) -> Result<bool, ServiceError> {
        match self.store.update(poll.id, &poll.state, next).await {
            Ok(_) => Ok(true),
            Err(StoreError::Conflict(id) | StoreError::NotFound(id)) => {
                debug!(poll = %id, "poll moved concurrently");
                Ok(false)
            }
            Err(err) => Err(ServiceError::store(err)),
        }
    }

    /// Publishes a transition; a closed bus only loses the fast path.
    async fn emit(&self, event: PollEvent) {
        let label = event.as_label();
        let poll = event.poll();
        if let Err(err) = self.bus.send(event).await {
            warn!(%poll, event = label, error = %err, "event not published");
        }
    }
}

#[cfg(test)]
pub(crate) mod testkit {
    use super::*;
    use crate::core::TokioClock;
    use crate::polls::store::MemoryStore;
    use crate::receivers::Receive;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Collects every event published on the bus.
    #[derive(Default)]
    pub(crate) struct Recorder {
        seen: Mutex<Vec<PollEvent>>,
    }

    impl Recorder {
        pub(crate) fn seen(&self) -> Vec<PollEvent> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Receive<PollEvent> for Recorder {
        async fn on_event(&self, event: &PollEvent) {
            self.seen.lock().unwrap().push(event.clone());
        }
    }

    pub(crate) struct Kit {
        pub(crate) store: Arc<MemoryStore>,
        pub(crate) bus: Manager<PollEvent>,
        pub(crate) clock: TokioClock,
        pub(crate) recorder: Arc<Recorder>,
        pub(crate) ctx: PollContext,
    }

    pub(crate) async fn kit() -> Kit {
        let store = Arc::new(MemoryStore::new());
        let bus = Manager::new(16);
        let clock = TokioClock::new();
        let recorder = Arc::new(Recorder::default());
        bus.add_receiver(recorder.clone()).await.unwrap();
        let ctx = PollContext::new(
            store.clone(),
            bus.clone(),
            Arc::new(clock),
            Duration::from_secs(3600),
        );
        Kit {
            store,
            bus,
            clock,
            recorder,
            ctx,
        }
    }

    /// Events delivered so far (closes the bus).
    pub(crate) async fn drain(kit: &Kit) -> Vec<PollEvent> {
        kit.bus.close().await.unwrap();
        kit.recorder.seen()
    }
}
