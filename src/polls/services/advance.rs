use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::PollContext;
use crate::core::{DueStream, DueTime, Processed, Service, ServiceRunnerControl};
use crate::error::ServiceError;
use crate::polls::event::PollEvent;
use crate::polls::model::{Poll, PollId, PollState};

/// Replaces a non-final round with the next one on quorum or at the round deadline.
#[derive(Debug)]
pub struct AdvanceRoundService {
    ctx: PollContext,
}

impl AdvanceRoundService {
    pub fn new(ctx: PollContext) -> Self {
        Self { ctx }
    }
}

fn due(poll: &Poll, now: DateTime<Utc>) -> DueTime {
    poll.advance_due(now)
}

#[async_trait]
impl Service for AdvanceRoundService {
    type Event = PollEvent;
    type Id = PollId;

    fn name(&self) -> &str {
        "poll-advance"
    }

    async fn process_one(&self, id: &PollId) -> Result<Processed, ServiceError> {
        let Some((poll, now)) = self.ctx.load_due(*id, due).await? else {
            return Ok(Processed::NothingToDoYet);
        };
        let Some(round) = poll.state.round() else {
            return Ok(Processed::NothingToDoYet);
        };
        let next = round + 1;
        if !self.ctx.transition(&poll, PollState::open(next, now)).await? {
            return Ok(Processed::NothingToDoYet);
        }
        info!(poll = %id, round = next, early = poll.has_quorum(), "round advanced");
        self.ctx
            .emit(PollEvent::RoundAdvanced {
                poll: *id,
                round: next,
            })
            .await;
        Ok(Processed::Advanced)
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
            PollEvent::Started { .. } | PollEvent::VoteCast { .. }
        )
    }

    async fn receive_event(&self, event: &PollEvent, control: &mut ServiceRunnerControl<PollId>) {
        debug!(poll = %event.poll(), event = event.as_label(), "advance candidate");
        control.schedule(event.poll());
    }
}
