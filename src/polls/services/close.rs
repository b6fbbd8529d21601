use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use super::PollContext;
use crate::core::{DueStream, DueTime, Processed, Service, ServiceRunnerControl};
use crate::error::ServiceError;
use crate::polls::event::PollEvent;
use crate::polls::model::{Poll, PollId, PollState};

/// Closes open polls at their absolute deadline or when the final round ends.
#[derive(Debug)]
pub struct ClosePollService {
    ctx: PollContext,
}

impl ClosePollService {
    pub fn new(ctx: PollContext) -> Self {
        Self { ctx }
    }
}

fn due(poll: &Poll, now: DateTime<Utc>) -> DueTime {
    poll.close_due(now)
}

#[async_trait]
impl Service for ClosePollService {
    type Event = PollEvent;
    type Id = PollId;

    fn name(&self) -> &str {
        "poll-close"
    }

    async fn process_one(&self, id: &PollId) -> Result<Processed, ServiceError> {
        let Some((poll, now)) = self.ctx.load_due(*id, due).await? else {
            return Ok(Processed::NothingToDoYet);
        };
        let Some(rounds) = poll.state.round() else {
            return Ok(Processed::NothingToDoYet);
        };
        let closed = PollState::Closed { at: now, rounds };
        if !self.ctx.transition(&poll, closed).await? {
            return Ok(Processed::NothingToDoYet);
        }
        info!(poll = %id, rounds, "poll closed");
        self.ctx
            .emit(PollEvent::Closed { poll: *id, rounds })
            .await;
        Ok(Processed::AdvancedUntil(DueTime::Never))
    }

    fn check_all(&self) -> DueStream<'_, PollId> {
        self.ctx.scan(due)
    }

    async fn check_one(&self, id: &PollId) -> Result<DueTime, ServiceError> {
        self.ctx.check(*id, due).await
    }

    fn check_interval(&self) -> Duration {
        self.ctx.check_interval
    }

    fn filter_event(&self, event: &PollEvent) -> bool {
        matches!(
            event,
            PollEvent::Started { .. } | PollEvent::VoteCast { .. } | PollEvent::RoundAdvanced { .. }
        )
    }

    async fn receive_event(&self, event: &PollEvent, control: &mut ServiceRunnerControl<PollId>) {
        control.schedule(event.poll());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Clock;
    use crate::polls::services::testkit::{drain, kit};
    use crate::polls::store::PollStore;
    use futures::StreamExt;

    #[tokio::test(start_paused = true)]
    async fn absolute_deadline_closes_after_min_rounds() {
        let kit = kit().await;
        let svc = ClosePollService::new(kit.ctx.clone());
        let t0 = kit.clock.now();
        let poll = Poll::new(PollId(5), "retro", t0)
            .with_rounds(1, 3)
            .with_closes_at(t0 + chrono::Duration::seconds(30));
        kit.store.insert(poll).await.unwrap();
        kit.store
            .update(PollId(5), &PollState::Scheduled, PollState::open(1, t0))
            .await
            .unwrap();

        assert_eq!(
            svc.check_one(&PollId(5)).await.unwrap(),
            DueTime::At(t0 + chrono::Duration::seconds(30))
        );
        assert_eq!(
            svc.process_one(&PollId(5)).await.unwrap(),
            Processed::NothingToDoYet
        );

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(
            svc.process_one(&PollId(5)).await.unwrap(),
            Processed::AdvancedUntil(DueTime::Never)
        );
        assert_eq!(
            svc.process_one(&PollId(5)).await.unwrap(),
            Processed::NothingToDoYet
        );

        let state = kit.store.get(PollId(5)).await.unwrap().state;
        assert_eq!(
            state,
            PollState::Closed {
                at: t0 + chrono::Duration::seconds(30),
                rounds: 1
            }
        );
        assert_eq!(
            drain(&kit).await,
            vec![PollEvent::Closed {
                poll: PollId(5),
                rounds: 1
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn scan_reports_every_poll() {
        let kit = kit().await;
        let svc = ClosePollService::new(kit.ctx.clone());
        let t0 = kit.clock.now();
        kit.store.insert(Poll::new(PollId(1), "a", t0)).await.unwrap();
        kit.store
            .insert(Poll::new(PollId(2), "b", t0).with_round_duration(Duration::from_secs(10)))
            .await
            .unwrap();
        kit.store
            .update(PollId(2), &PollState::Scheduled, PollState::open(1, t0))
            .await
            .unwrap();

        let items: Vec<_> = svc
            .check_all()
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(
            items,
            vec![
                (PollId(1), DueTime::Never),
                (PollId(2), DueTime::after(t0, Duration::from_secs(10))),
            ]
        );
    }
}
