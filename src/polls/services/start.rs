use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::PollContext;
use crate::core::{DueStream, DueTime, Processed, Service, ServiceRunnerControl};
use crate::error::ServiceError;
use crate::polls::event::PollEvent;
use crate::polls::model::{Poll, PollId, PollState};

/// Opens round 1 of scheduled polls at `starts_at`.
#[derive(Debug)]
pub struct StartPollService {
    ctx: PollContext,
}

impl StartPollService {
    pub fn new(ctx: PollContext) -> Self {
        Self { ctx }
    }
}

fn due(poll: &Poll, _now: chrono::DateTime<chrono::Utc>) -> DueTime {
    poll.start_due()
}

#[async_trait]
impl Service for StartPollService {
    type Event = PollEvent;
    type Id = PollId;

    fn name(&self) -> &str {
        "poll-start"
    }

    async fn process_one(&self, id: &PollId) -> Result<Processed, ServiceError> {
        let Some((poll, now)) = self.ctx.load_due(*id, due).await? else {
            return Ok(Processed::NothingToDoYet);
        };
        if !self.ctx.transition(&poll, PollState::open(1, now)).await? {
            return Ok(Processed::NothingToDoYet);
        }
        info!(poll = %id, title = %poll.title, "poll started");
        self.ctx
            .emit(PollEvent::Started {
                poll: *id,
                round: 1,
            })
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
        matches!(event, PollEvent::Created { .. })
    }

    async fn receive_event(&self, event: &PollEvent, control: &mut ServiceRunnerControl<PollId>) {
        control.schedule(event.poll());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polls::services::testkit::{drain, kit};
    use crate::polls::store::PollStore;

    #[tokio::test(start_paused = true)]
    async fn opens_round_one_once() {
        let kit = kit().await;
        let svc = StartPollService::new(kit.ctx.clone());
        let t0 = crate::Clock::now(&kit.clock);
        kit.store
            .insert(Poll::new(PollId(1), "lunch", t0))
            .await
            .unwrap();

        assert_eq!(svc.check_one(&PollId(1)).await.unwrap(), DueTime::At(t0));
        assert_eq!(
            svc.process_one(&PollId(1)).await.unwrap(),
            Processed::AdvancedUntil(DueTime::Never)
        );
        assert_eq!(
            svc.process_one(&PollId(1)).await.unwrap(),
            Processed::NothingToDoYet
        );

        let poll = kit.store.get(PollId(1)).await.unwrap();
        assert_eq!(poll.state, PollState::open(1, t0));
        assert_eq!(
            drain(&kit).await,
            vec![PollEvent::Started {
                poll: PollId(1),
                round: 1
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn not_yet_started_poll_is_left_alone() {
        let kit = kit().await;
        let svc = StartPollService::new(kit.ctx.clone());
        let later = crate::Clock::now(&kit.clock) + chrono::Duration::seconds(60);
        kit.store
            .insert(Poll::new(PollId(2), "later", later))
            .await
            .unwrap();

        assert_eq!(
            svc.process_one(&PollId(2)).await.unwrap(),
            Processed::NothingToDoYet
        );
        assert_eq!(
            svc.process_one(&PollId(404)).await.unwrap(),
            Processed::NothingToDoYet
        );
        assert_eq!(svc.check_one(&PollId(404)).await.unwrap(), DueTime::Never);
        assert!(svc.filter_event(&PollEvent::Created { poll: PollId(2) }));
        assert!(!svc.filter_event(&PollEvent::Closed {
            poll: PollId(2),
            rounds: 1
        }));
        assert!(drain(&kit).await.is_empty());
    }
}
