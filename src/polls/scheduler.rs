//! # PollScheduler: the three poll runners on one bus.
//!
//! ```text
//! create_poll ──► store.insert ──► Created ──┐
//! cast_vote   ──► store.record_vote ──► VoteCast ──┤
//!                                                  ▼
//!                                        Manager<PollEvent>
//!                        ┌─────────────────────┼─────────────────────┐
//!                        ▼                     ▼                     ▼
//!                  start runner          advance runner        close runner
//!                        │ Started             │ RoundAdvanced       │ Closed
//!                        └──────────► back onto the bus ◄────────────┘
//! ```
//!
//! ## Shutdown
//! `shutdown()` stops every runner concurrently with [`Config::grace`], then closes
//! the bus (drain + `on_stop` for every receiver). Runners still busy after the grace
//! period are aborted and reported in [`RuntimeError::GraceExceeded`].

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{info, warn};

use crate::config::Config;
use crate::core::{DueTime, RunnerConfig, RunnerHandle, ServiceRunner};
use crate::error::{BusError, RuntimeError};
use crate::events::Manager;
use crate::polls::error::PollError;
use crate::polls::event::PollEvent;
use crate::polls::model::{Poll, PollId};
use crate::polls::services::{AdvanceRoundService, ClosePollService, PollContext, StartPollService};
use crate::polls::store::PollStore;

/// Stores a new poll and announces it.
pub async fn create_poll(
    store: &dyn PollStore,
    manager: &Manager<PollEvent>,
    poll: Poll,
) -> Result<(), PollError> {
    let id = poll.id;
    store.insert(poll).await?;
    manager.send(PollEvent::Created { poll: id }).await?;
    Ok(())
}

/// Records a vote in the current round and announces it; returns the round.
pub async fn cast_vote(
    store: &dyn PollStore,
    manager: &Manager<PollEvent>,
    poll: PollId,
    voter: &str,
) -> Result<u32, PollError> {
    let round = store.record_vote(poll, voter).await?;
    manager
        .send(PollEvent::VoteCast {
            poll,
            round,
            voter: voter.to_string(),
        })
        .await?;
    Ok(round)
}

/// Running poll runtime.
pub struct PollScheduler {
    store: Arc<dyn PollStore>,
    bus: Manager<PollEvent>,
    runners: Vec<RunnerHandle<PollId>>,
    grace: Duration,
}

impl PollScheduler {
    /// Starts the start/advance/close runners on `manager` using the system clock.
    pub async fn start(
        store: Arc<dyn PollStore>,
        manager: Manager<PollEvent>,
        config: &Config,
    ) -> Result<Self, RuntimeError> {
        Self::start_with(store, manager, config, RunnerConfig::from_config(config)).await
    }

    /// Like [`start`](Self::start) with explicit runner settings (clock, jitter).
    pub async fn start_with(
        store: Arc<dyn PollStore>,
        manager: Manager<PollEvent>,
        config: &Config,
        runner: RunnerConfig,
    ) -> Result<Self, RuntimeError> {
        let ctx = PollContext::new(
            Arc::clone(&store),
            manager.clone(),
            Arc::clone(&runner.clock),
            config.check_interval(),
        );

        let mut runners = Vec::with_capacity(3);
        let started = async {
            let start = StartPollService::new(ctx.clone());
            runners.push(ServiceRunner::start(start, &manager, runner.clone()).await?);
            let advance = AdvanceRoundService::new(ctx.clone());
            runners.push(ServiceRunner::start(advance, &manager, runner.clone()).await?);
            let close = ClosePollService::new(ctx);
            runners.push(ServiceRunner::start(close, &manager, runner).await?);
            Ok::<_, RuntimeError>(())
        }
        .await;

        if let Err(err) = started {
            rollback(runners).await;
            return Err(err);
        }

        info!(runners = runners.len(), "poll scheduler started");
        Ok(Self {
            store,
            bus: manager,
            runners,
            grace: config.grace,
        })
    }

    /// The bus the runners listen on.
    pub fn manager(&self) -> &Manager<PollEvent> {
        &self.bus
    }

    pub fn store(&self) -> &Arc<dyn PollStore> {
        &self.store
    }

    /// Next wake of every runner, by service name.
    pub fn next_wakes(&self) -> Vec<(String, DueTime)> {
        self.runners
            .iter()
            .map(|h| (h.name().to_string(), h.next_wake()))
            .collect()
    }

    /// [`create_poll`] on this scheduler's store and bus.
    pub async fn create_poll(&self, poll: Poll) -> Result<(), PollError> {
        create_poll(self.store.as_ref(), &self.bus, poll).await
    }

    /// [`cast_vote`] on this scheduler's store and bus.
    pub async fn cast_vote(&self, poll: PollId, voter: &str) -> Result<u32, PollError> {
        cast_vote(self.store.as_ref(), &self.bus, poll, voter).await
    }

    /// Stops the runners, then closes the bus.
    pub async fn shutdown(self) -> Result<(), RuntimeError> {
        let grace = self.grace;
        let results = join_all(self.runners.into_iter().map(|h| h.stop_with_grace(grace))).await;

        let mut stuck = Vec::new();
        for res in results {
            match res {
                Ok(()) => {}
                Err(RuntimeError::GraceExceeded { stuck: names, .. }) => stuck.extend(names),
                Err(err) => warn!(label = err.as_label(), error = %err, "runner stop failed"),
            }
        }

        match self.bus.close().await {
            Ok(()) | Err(BusError::AlreadyClosed) => {}
            Err(err) => return Err(err.into()),
        }

        if stuck.is_empty() {
            info!("poll scheduler stopped");
            Ok(())
        } else {
            warn!(?stuck, ?grace, "runners aborted after grace period");
            Err(RuntimeError::GraceExceeded { grace, stuck })
        }
    }

    /// Runs until a termination signal arrives, then shuts down.
    pub async fn run_until_signal(self) -> Result<(), RuntimeError> {
        if let Err(err) = wait_for_shutdown_signal().await {
            warn!(error = %err, "signal handler unavailable; shutting down");
        }
        info!("shutdown signal received");
        self.shutdown().await
    }
}

/// Stops runners started before a failed start.
async fn rollback(runners: Vec<RunnerHandle<PollId>>) {
    for handle in runners {
        let name = handle.name().to_string();
        if let Err(err) = handle.stop().await {
            warn!(
                runner = %name,
                label = err.as_label(),
                error = %err,
                "rollback stop failed"
            );
        }
    }
}

/// Completes on SIGINT, SIGTERM or SIGQUIT.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = term.recv() => Ok(()),
        _ = quit.recv() => Ok(()),
    }
}

/// Completes on Ctrl-C.
#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Clock, TokioClock};
    use crate::polls::error::StoreError;
    use crate::polls::model::PollState;
    use crate::polls::services::testkit::Recorder;
    use crate::polls::store::MemoryStore;
    use tokio::time;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    async fn settle() {
        time::sleep(Duration::from_millis(1)).await;
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        recorder: Arc<Recorder>,
        clock: TokioClock,
        scheduler: PollScheduler,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let bus = Manager::new(32);
        let recorder = Arc::new(Recorder::default());
        bus.add_receiver(recorder.clone()).await.unwrap();
        let clock = TokioClock::new();
        let runner = RunnerConfig::default().with_clock(Arc::new(clock));
        let scheduler = PollScheduler::start_with(store.clone(), bus, &Config::default(), runner)
            .await
            .unwrap();
        Fixture {
            store,
            recorder,
            clock,
            scheduler,
        }
    }

    async fn state(fx: &Fixture, id: PollId) -> PollState {
        fx.store.get(id).await.unwrap().state
    }

    #[tokio::test(start_paused = true)]
    async fn poll_runs_through_its_lifecycle() {
        let fx = fixture().await;
        let t0 = fx.clock.now();
        let id = PollId(7);
        let poll = Poll::new(id, "offsite", t0 + chrono::Duration::seconds(10))
            .with_round_duration(secs(60))
            .with_quorum(2)
            .with_rounds(2, 3);
        fx.scheduler.create_poll(poll).await.unwrap();
        settle().await;
        assert_eq!(state(&fx, id).await, PollState::Scheduled);

        time::sleep(secs(15)).await;
        let ten = t0 + chrono::Duration::seconds(10);
        assert_eq!(state(&fx, id).await, PollState::open(1, ten));

        assert_eq!(fx.scheduler.cast_vote(id, "ann").await, Ok(1));
        settle().await;
        assert_eq!(state(&fx, id).await.round(), Some(1));
        assert_eq!(fx.scheduler.cast_vote(id, "bob").await, Ok(1));
        settle().await;
        assert_eq!(state(&fx, id).await.round(), Some(2), "quorum ends round 1 early");

        // Round 2 started at ~t0+15s and runs its full minute.
        time::sleep(secs(61)).await;
        assert_eq!(state(&fx, id).await.round(), Some(3));

        time::sleep(secs(61)).await;
        let PollState::Closed { rounds, .. } = state(&fx, id).await else {
            panic!("poll should be closed");
        };
        assert_eq!(rounds, 3);

        let recorder = fx.recorder.clone();
        fx.scheduler.shutdown().await.unwrap();

        let kinds: Vec<_> = recorder.seen().iter().map(PollEvent::as_label).collect();
        assert_eq!(
            kinds,
            vec![
                "poll_created",
                "poll_started",
                "poll_vote_cast",
                "poll_vote_cast",
                "poll_round_advanced",
                "poll_round_advanced",
                "poll_closed",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn absolute_deadline_closes_after_min_rounds() {
        let fx = fixture().await;
        let t0 = fx.clock.now();
        let id = PollId(8);
        let poll = Poll::new(id, "deadline", t0)
            .with_round_duration(secs(20))
            .with_rounds(2, 5)
            .with_closes_at(t0 + chrono::Duration::seconds(30));
        fx.scheduler.create_poll(poll).await.unwrap();

        // Round 1 ends at 20s; the deadline at 30s only applies from round 2.
        time::sleep(secs(31)).await;
        let PollState::Closed { at, rounds } = state(&fx, id).await else {
            panic!("poll should be closed");
        };
        assert_eq!(rounds, 2);
        assert_eq!(at, t0 + chrono::Duration::seconds(30));

        fx.scheduler.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn polls_stored_before_start_are_picked_up() {
        let store = Arc::new(MemoryStore::new());
        let clock = TokioClock::new();
        store
            .insert(Poll::new(PollId(1), "backlog", clock.now()))
            .await
            .unwrap();

        let runner = RunnerConfig::default().with_clock(Arc::new(clock));
        let scheduler =
            PollScheduler::start_with(store.clone(), Manager::new(8), &Config::default(), runner)
                .await
                .unwrap();
        settle().await;

        assert_eq!(store.get(PollId(1)).await.unwrap().state.round(), Some(1));
        let wakes = scheduler.next_wakes();
        assert_eq!(wakes.len(), 3);
        assert!(wakes.iter().all(|(_, due)| !due.is_never()));
        scheduler.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn votes_are_validated_by_the_store() {
        let fx = fixture().await;
        let t0 = fx.clock.now();
        let later = Poll::new(PollId(3), "later", t0 + chrono::Duration::seconds(60));
        fx.scheduler.create_poll(later.clone()).await.unwrap();

        assert_eq!(
            fx.scheduler.create_poll(later).await,
            Err(PollError::Store(StoreError::Conflict(PollId(3))))
        );
        assert_eq!(
            fx.scheduler.cast_vote(PollId(3), "ann").await,
            Err(PollError::Store(StoreError::NotOpen(PollId(3))))
        );
        fx.scheduler.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_the_bus() {
        let fx = fixture().await;
        let bus = fx.scheduler.manager().clone();
        fx.scheduler.shutdown().await.unwrap();

        assert!(bus.is_closed());
        assert_eq!(
            create_poll(fx.store.as_ref(), &bus, Poll::new(PollId(1), "x", fx.clock.now())).await,
            Err(PollError::Bus(BusError::Closed))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn start_on_closed_bus_fails() {
        let bus = Manager::new(8);
        bus.close().await.unwrap();
        let res = PollScheduler::start(Arc::new(MemoryStore::new()), bus, &Config::default()).await;
        assert!(matches!(res, Err(RuntimeError::Bus(BusError::Closed))));
    }

    #[tokio::test(start_paused = true)]
    async fn rollback_stops_runners_already_started() {
        let store: Arc<dyn PollStore> = Arc::new(MemoryStore::new());
        let bus = Manager::new(8);
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::new());
        let ctx = PollContext::new(store, bus.clone(), Arc::clone(&clock), secs(3600));
        let runner = RunnerConfig::default().with_clock(clock);
        let handle = ServiceRunner::start(StartPollService::new(ctx), &bus, runner)
            .await
            .unwrap();
        settle().await;
        assert_eq!(bus.receiver_count(), 1);

        rollback(vec![handle]).await;
        bus.send(PollEvent::Created { poll: PollId(1) }).await.unwrap();
        bus.close().await.unwrap();
        assert_eq!(bus.receiver_count(), 0);
    }
}
