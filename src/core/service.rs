//! # Service contract consumed by the runner.
//!
//! A [`Service`] describes one background job over a dynamic set of entities:
//! how to compute each entity's due time, how to process a due entity, how often
//! to rescan everything, and which events might move a due time earlier.
//!
//! ## Runner ↔ service interaction
//! ```text
//! start ──► check_all() ──► seed alarm (min due)
//!
//! event ──► filter_event(&E)? ──► receive_event(&E, control)
//!                                    └─► control.schedule(id) ──► check_one(id) ──► fold into alarm
//!
//! alarm ──► check_all() ──► due ids (sorted) ──► process_one(id) ──► check_one(id) ──► next alarm
//! ```
//!
//! ## Rules
//! - `process_one` must be idempotent: the runner may call it for an entity that a
//!   concurrent path already advanced. Return [`Processed::NothingToDoYet`] then.
//! - `check_all` yields a finite, one-pass stream; it is called again for every pass.
//! - Errors are logged by the runner and never stop it.

use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::core::alarm::DueTime;
use crate::error::ServiceError;

/// One-pass stream of `(entity, due time)` pairs produced by [`Service::check_all`].
pub type DueStream<'a, Id> = BoxStream<'a, Result<(Id, DueTime), ServiceError>>;

/// Outcome of [`Service::process_one`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Processed {
    /// The transition was applied; the runner re-derives the next due time with `check_one`.
    Advanced,
    /// The transition was applied and the entity is next due at the given time.
    AdvancedUntil(DueTime),
    /// The entity turned out not to be due (another path already moved it).
    ///
    /// Expected under overlapping alarm/event triggers; not logged as an error.
    NothingToDoYet,
}

/// # Pluggable background job.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use async_trait::async_trait;
/// use chrono::Utc;
/// use futures::StreamExt;
/// use alarmvisor::{DueStream, DueTime, Processed, Service, ServiceError, ServiceRunnerControl};
///
/// #[derive(Clone, Debug)]
/// enum Tick { Poke(u32) }
///
/// struct Reminder;
///
/// #[async_trait]
/// impl Service for Reminder {
///     type Event = Tick;
///     type Id = u32;
///
///     fn name(&self) -> &str { "reminder" }
///
///     async fn process_one(&self, _id: &u32) -> Result<Processed, ServiceError> {
///         Ok(Processed::AdvancedUntil(DueTime::Never))
///     }
///
///     fn check_all(&self) -> DueStream<'_, u32> {
///         futures::stream::iter([Ok((1, DueTime::At(Utc::now())))]).boxed()
///     }
///
///     async fn check_one(&self, _id: &u32) -> Result<DueTime, ServiceError> {
///         Ok(DueTime::Never)
///     }
///
///     fn check_interval(&self) -> Duration { Duration::from_secs(3600) }
///
///     fn filter_event(&self, _event: &Tick) -> bool { true }
///
///     async fn receive_event(&self, event: &Tick, control: &mut ServiceRunnerControl<u32>) {
///         let Tick::Poke(id) = event;
///         control.schedule(*id);
///     }
/// }
/// ```
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Event type of the bus this service listens on.
    type Event: Clone + Send + Sync + 'static;
    /// Entity identifier.
    type Id: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// Returns a stable, human-readable name used in logs.
    fn name(&self) -> &str;

    /// Processes one entity the runner believes is due.
    async fn process_one(&self, id: &Self::Id) -> Result<Processed, ServiceError>;

    /// Recomputes the due time of every live entity, lazily.
    fn check_all(&self) -> DueStream<'_, Self::Id>;

    /// Recomputes the due time of one entity ([`DueTime::Never`] when not due).
    async fn check_one(&self, id: &Self::Id) -> Result<DueTime, ServiceError>;

    /// Fallback rescan interval (periodic safety net).
    fn check_interval(&self) -> Duration;

    /// Cheap relevance predicate, evaluated inside the bus worker.
    ///
    /// Must not block: it runs on the bus fan-out path.
    fn filter_event(&self, event: &Self::Event) -> bool;

    /// Reacts to a relevant event by scheduling entities that may now be due sooner.
    async fn receive_event(
        &self,
        event: &Self::Event,
        control: &mut ServiceRunnerControl<Self::Id>,
    );
}

/// Narrow handle given to [`Service::receive_event`].
///
/// Only exposes [`schedule`](Self::schedule); scheduled entities are re-derived with
/// `check_one` right after `receive_event` returns and folded into the alarm.
#[derive(Debug)]
pub struct ServiceRunnerControl<Id> {
    scheduled: Vec<Id>,
}

impl<Id: PartialEq> ServiceRunnerControl<Id> {
    pub(crate) fn new() -> Self {
        Self {
            scheduled: Vec::new(),
        }
    }

    /// Asks the runner to recompute `id`'s due time and wake earlier if needed.
    pub fn schedule(&mut self, id: Id) {
        if !self.scheduled.contains(&id) {
            self.scheduled.push(id);
        }
    }

    pub(crate) fn into_scheduled(self) -> Vec<Id> {
        self.scheduled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_deduplicates_in_call_order() {
        let mut control = ServiceRunnerControl::new();
        control.schedule(3);
        control.schedule(1);
        control.schedule(3);
        assert_eq!(control.into_scheduled(), vec![3, 1]);
    }
}
