//! # ServiceRunner: alarm-driven loop for one service.
//!
//! Drives one [`Service`] with:
//! - a single best-known alarm (never a queue of all entities),
//! - an event fast path (`receive_event` → `check_one` → earlier alarm),
//! - a periodic full rescan every `check_interval` (slow path safety net),
//! - cooperative cancellation via [`CancellationToken`].
//!
//! ## State machine
//! ```text
//! Starting ──► register receiver ──► check_all() seeds alarm ──► Waiting
//!
//! Waiting: select! {
//!   ├─ stop requested        ──► Stopped
//!   ├─ wake already due      ──► Processing (ahead of queued events)
//!   ├─ relevant event        ──► receive_event ──► check_one(scheduled) ──► fold ──► Waiting
//!   └─ min(alarm, rescan_at) elapsed
//!         ├─ not due yet (drift) ──────────────────────────────────────────► Waiting
//!         └─ Processing: check_all() ──► due ids sorted by due time
//!                          └─► process_one(id) ──► fresh due time
//!            Recomputing: next = min(fresh due, future due, now + interval) ──► Waiting
//! }
//! ```
//!
//! ## Rules
//! - The due set is **re-derived** from the service at every wake, never cached.
//! - Events are folded **before** the next wait; a burst cannot be lost between
//!   dequeue and re-arm.
//! - Service errors are logged and skipped; they never stop the runner.
//! - A due time that is still in the past right after processing is **not** folded:
//!   the entity waits for the next rescan instead of spinning the loop.
//! - Stop takes effect at the next Waiting iteration; in-flight `process_one` completes.
//!   The runner's receiver then retires and the bus drops it before its next event.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::{select, sync::mpsc, sync::watch, task::JoinHandle, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::core::alarm::{Alarm, DueTime};
use crate::core::config::RunnerConfig;
use crate::core::service::{Processed, Service, ServiceRunnerControl};
use crate::error::RuntimeError;
use crate::events::Manager;
use crate::receivers::Receive;

/// Result of one `check_all` pass.
struct Scan<Id> {
    /// Entities due at scan time, in stream order.
    due: Vec<(Id, DueTime)>,
    /// Earliest entity due after scan time.
    next: Alarm<Id>,
}

/// Receiver the runner registers on the bus: filters, then forwards to the inbox.
struct InboxReceiver<S: Service> {
    service: Arc<S>,
    name: &'static str,
    tx: mpsc::UnboundedSender<S::Event>,
}

#[async_trait]
impl<S: Service> Receive<S::Event> for InboxReceiver<S> {
    async fn on_event(&self, event: &S::Event) {
        if self.tx.is_closed() || !self.service.filter_event(event) {
            return;
        }
        // Fails only once the runner stopped; the event is irrelevant then.
        if self.tx.send(event.clone()).is_err() {
            trace!(service = self.service.name(), "runner gone; event dropped");
        }
    }

    async fn on_stop(&self) {
        if self.tx.is_closed() {
            debug!(service = self.service.name(), "runner stopped; receiver detached");
        } else {
            debug!(
                service = self.service.name(),
                "bus closed; runner continues on alarms only"
            );
        }
    }

    fn is_retired(&self) -> bool {
        self.tx.is_closed()
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Alarm-driven runner for one [`Service`].
///
/// Constructed and spawned by [`ServiceRunner::start`]; controlled through the
/// returned [`RunnerHandle`].
pub struct ServiceRunner<S: Service> {
    service: Arc<S>,
    cfg: RunnerConfig,
    inbox: mpsc::UnboundedReceiver<S::Event>,
    /// Earliest known entity due time.
    alarm: Alarm<S::Id>,
    /// Next periodic full rescan.
    rescan_at: DueTime,
    /// Effective next wake, observed by handles.
    wake_tx: watch::Sender<Alarm<S::Id>>,
}

impl<S: Service> ServiceRunner<S> {
    /// Starts a runner for `service` on `manager`.
    ///
    /// Registers the runner's receiver, runs the initial `check_all` pass to seed the
    /// alarm, spawns the loop, and returns once seeding is complete.
    ///
    /// Returns [`RuntimeError::Bus`] when the manager is closed.
    pub async fn start(
        service: S,
        manager: &Manager<S::Event>,
        cfg: RunnerConfig,
    ) -> Result<RunnerHandle<S::Id>, RuntimeError> {
        Self::start_shared(Arc::new(service), manager, cfg).await
    }

    /// Like [`start`](Self::start), for a service the caller keeps a handle to.
    pub async fn start_shared(
        service: Arc<S>,
        manager: &Manager<S::Event>,
        cfg: RunnerConfig,
    ) -> Result<RunnerHandle<S::Id>, RuntimeError> {
        let name = service.name().to_string();
        let (tx, inbox) = mpsc::unbounded_channel();
        let receiver = InboxReceiver {
            service: Arc::clone(&service),
            name: "service-runner",
            tx,
        };
        manager.add_receiver(Arc::new(receiver)).await?;

        let (wake_tx, wake_rx) = watch::channel(Alarm::never());
        let mut runner = Self {
            service,
            cfg,
            inbox,
            alarm: Alarm::never(),
            rescan_at: DueTime::Never,
            wake_tx,
        };
        runner.seed().await;

        let token = CancellationToken::new();
        let join = tokio::spawn(runner.run(token.clone()));
        Ok(RunnerHandle {
            name,
            token,
            join,
            wake: wake_rx,
        })
    }

    /// Starting: one `check_all` pass, no processing.
    async fn seed(&mut self) {
        let now = self.now();
        let scan = self.scan(now).await;
        let mut alarm = scan.next;
        for (id, due) in scan.due {
            alarm.offer(due, Some(id));
        }
        self.alarm = alarm;
        self.arm_rescan(now);
        info!(
            service = self.service.name(),
            alarm = %self.alarm.due,
            rescan_at = %self.rescan_at,
            "runner started"
        );
        self.publish_wake();
    }

    /// Main loop: Waiting until stop is requested.
    async fn run(mut self, token: CancellationToken) {
        let mut inbox_open = true;

        loop {
            if token.is_cancelled() {
                break;
            }
            // A due wake goes ahead of queued events.
            let now = self.now();
            if self.wake_due().is_due(now) {
                self.on_wake().await;
                continue;
            }

            let sleep_for = self.wake_due().remaining(now);
            let sleep = async move {
                match sleep_for {
                    Some(d) => time::sleep(d).await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::pin!(sleep);

            select! {
                biased;
                _ = token.cancelled() => break,
                msg = self.inbox.recv(), if inbox_open => match msg {
                    Some(event) => self.on_event(event).await,
                    None => inbox_open = false,
                },
                _ = &mut sleep => self.on_wake().await,
            }
        }
        info!(service = self.service.name(), "runner stopped");
    }

    /// Fast path: fold scheduled entities into the alarm, no rescan.
    async fn on_event(&mut self, event: S::Event) {
        let mut control = ServiceRunnerControl::new();
        self.service.receive_event(&event, &mut control).await;

        for id in control.into_scheduled() {
            match self.service.check_one(&id).await {
                Ok(due) => {
                    if self.alarm.offer(due, Some(id.clone())) {
                        debug!(service = self.service.name(), ?id, %due, "alarm moved earlier");
                    }
                }
                Err(err) => warn!(
                    service = self.service.name(),
                    ?id,
                    label = err.as_label(),
                    error = %err,
                    "check_one failed"
                ),
            }
        }
        self.publish_wake();
    }

    async fn on_wake(&mut self) {
        let now = self.now();
        if !self.alarm.due.is_due(now) && !self.rescan_at.is_due(now) {
            trace!(service = self.service.name(), "early wake");
            return;
        }
        self.cycle(now).await;
    }

    /// Processing + Recomputing.
    async fn cycle(&mut self, now: DateTime<Utc>) {
        let Scan { mut due, mut next } = self.scan(now).await;
        due.sort_by_key(|(_, at)| *at);
        debug!(
            service = self.service.name(),
            due = due.len(),
            "processing due entities"
        );

        for (id, _) in due {
            let fresh = match self.service.process_one(&id).await {
                Ok(Processed::AdvancedUntil(at)) => Some(at),
                Ok(Processed::Advanced) => self.check_after(&id).await,
                Ok(Processed::NothingToDoYet) => {
                    debug!(service = self.service.name(), ?id, "nothing to do yet");
                    self.check_after(&id).await
                }
                Err(err) => {
                    warn!(
                        service = self.service.name(),
                        ?id,
                        label = err.as_label(),
                        error = %err,
                        "process_one failed"
                    );
                    None
                }
            };

            if let Some(at) = fresh {
                if at.is_due(self.now()) {
                    warn!(
                        service = self.service.name(),
                        ?id,
                        due = %at,
                        "still due after processing; deferred to next rescan"
                    );
                } else {
                    next.offer(at, Some(id));
                }
            }
        }

        self.alarm = next;
        self.arm_rescan(self.now());
        debug!(
            service = self.service.name(),
            alarm = %self.alarm.due,
            rescan_at = %self.rescan_at,
            "rescheduled"
        );
        self.publish_wake();
    }

    /// One `check_all` pass split into due-now and the earliest future entity.
    async fn scan(&self, now: DateTime<Utc>) -> Scan<S::Id> {
        let mut due = Vec::new();
        let mut next = Alarm::never();
        let mut stream = self.service.check_all();

        while let Some(item) = stream.next().await {
            match item {
                Ok((id, at)) if at.is_due(now) => due.push((id, at)),
                Ok((id, at)) => {
                    next.offer(at, Some(id));
                }
                Err(err) => warn!(
                    service = self.service.name(),
                    label = err.as_label(),
                    error = %err,
                    "check_all item failed"
                ),
            }
        }
        Scan { due, next }
    }

    async fn check_after(&self, id: &S::Id) -> Option<DueTime> {
        match self.service.check_one(id).await {
            Ok(at) => Some(at),
            Err(err) => {
                warn!(
                    service = self.service.name(),
                    ?id,
                    label = err.as_label(),
                    error = %err,
                    "check_one failed"
                );
                None
            }
        }
    }

    fn arm_rescan(&mut self, now: DateTime<Utc>) {
        let interval = self.cfg.rescan_jitter.apply(self.service.check_interval());
        // A zero interval would rescan in a tight loop.
        let interval = interval.max(Duration::from_millis(1));
        self.rescan_at = DueTime::after(now, interval);
    }

    /// Earliest of the alarm and the next rescan.
    fn wake_due(&self) -> DueTime {
        self.alarm.due.min(self.rescan_at)
    }

    fn publish_wake(&self) {
        let wake = if self.rescan_at < self.alarm.due {
            Alarm::fallback(self.rescan_at)
        } else {
            self.alarm.clone()
        };
        self.wake_tx.send_replace(wake);
    }

    fn now(&self) -> DateTime<Utc> {
        self.cfg.clock.now()
    }
}

/// Control handle for a started [`ServiceRunner`].
#[derive(Debug)]
pub struct RunnerHandle<Id> {
    name: String,
    token: CancellationToken,
    join: JoinHandle<()>,
    wake: watch::Receiver<Alarm<Id>>,
}

impl<Id: Clone> RunnerHandle<Id> {
    /// Name of the driven service.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// When the runner will wake next (alarm or periodic rescan, whichever is earlier).
    pub fn next_wake(&self) -> DueTime {
        self.wake.borrow().due
    }

    /// Snapshot of the effective next wake, including the entity that set it.
    pub fn alarm(&self) -> Alarm<Id> {
        self.wake.borrow().clone()
    }

    /// Returns true once the runner loop has exited.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Requests a cooperative stop and waits for the loop to exit.
    pub async fn stop(self) -> Result<(), RuntimeError> {
        self.token.cancel();
        self.join
            .await
            .map_err(|_| RuntimeError::RunnerPanicked { name: self.name })
    }

    /// Like [`stop`](Self::stop) but aborts the runner after `grace`.
    ///
    /// Returns [`RuntimeError::GraceExceeded`] if the runner was still busy.
    pub async fn stop_with_grace(mut self, grace: Duration) -> Result<(), RuntimeError> {
        self.token.cancel();
        match time::timeout(grace, &mut self.join).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(RuntimeError::RunnerPanicked { name: self.name }),
            Err(_elapsed) => {
                self.join.abort();
                Err(RuntimeError::GraceExceeded {
                    grace,
                    stuck: vec![self.name],
                })
            }
        }
    }
}
