//! # Event bus with an owned receiver set.
//!
//! [`Manager`] accepts events from any number of producers and fans each one out to
//! every registered [`Receive`] sink from a single dedicated worker task.
//!
//! ## Architecture
//! ```text
//! Producers (many):                         Worker (one):
//!   handler ──┐                              ┌─► receiver1.on_event(&E)
//!   runner1 ──┼──► [bounded queue] ──► loop ─┼─► receiver2.on_event(&E)
//!   runner2 ──┘    (Command<E>)              └─► receiverN.on_event(&E)
//! ```
//!
//! ## Rules
//! - **Backpressure, not drops**: `send()` waits only while the queue is full.
//! - **Fire-and-forget**: `send()` does not report whether anyone processed the event.
//! - **No replay**: registration travels through the same FIFO queue as events, so a
//!   receiver sees exactly the events sent after `add_receiver()` returned.
//! - **Per-receiver FIFO**: the worker awaits every receiver, in registration order,
//!   before dequeuing the next event.
//! - **Shutdown barrier**: `close()` drains accepted events, stops every receiver once,
//!   and only then returns. A send still waiting for a slot when close begins fails.
//! - **Retirement**: a receiver reporting [`is_retired`](Receive::is_retired) is dropped
//!   before the next event and gets its `on_stop` then instead of at close.
//!
//! ## Deadlocks
//! The worker awaits receivers inline. A receiver must never `close()` its own manager
//! or `send().await` into it from `on_event`; hand the event to another task instead.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, trace, warn};

use crate::error::BusError;
use crate::receivers::Receive;

/// Default inbound queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Work item for the manager worker.
enum Command<E> {
    Event(Arc<E>),
    Register(Arc<dyn Receive<E>>),
}

/// State shared by every clone of a [`Manager`].
struct Shared<E> {
    /// `None` once close has begun.
    tx: Mutex<Option<mpsc::Sender<Command<E>>>>,
    worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    receivers: Arc<AtomicUsize>,
    capacity: usize,
}

/// Cloneable handle to an event bus.
///
/// ### Lifecycle
/// ```text
/// open ──► (send / add_receiver accepted) ──► close() ──► closing ──► closed
///                                               │
///                                               ├─ drain accepted events
///                                               ├─ on_stop() once per receiver
///                                               └─ return
/// ```
///
/// ### Example
/// ```rust
/// use alarmvisor::{Manager, LogReceiver};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), alarmvisor::BusError> {
/// let bus: Manager<u32> = Manager::new(16);
/// bus.add_receiver(Arc::new(LogReceiver::new("numbers"))).await?;
/// bus.send(5).await?;
/// bus.send(7).await?;
/// bus.close().await?;
/// assert!(bus.send(9).await.is_err());
/// # Ok(())
/// # }
/// ```
pub struct Manager<E> {
    shared: Arc<Shared<E>>,
}

impl<E> Clone for Manager<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E> fmt::Debug for Manager<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("capacity", &self.shared.capacity)
            .field("receivers", &self.receiver_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<E> Manager<E>
where
    E: Send + Sync + 'static,
{
    /// Creates a bus with the given inbound queue capacity and spawns its worker.
    ///
    /// ### Notes
    /// - Must be called from within a tokio runtime.
    /// - The minimum capacity is 1 (clamped).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel::<Command<E>>(capacity);
        let receivers = Arc::new(AtomicUsize::new(0));
        let worker = tokio::spawn(run_worker(rx, Arc::clone(&receivers)));

        Self {
            shared: Arc::new(Shared {
                tx: Mutex::new(Some(tx)),
                worker: tokio::sync::Mutex::new(Some(worker)),
                receivers,
                capacity,
            }),
        }
    }

    /// Sends an event to every receiver registered before this call.
    ///
    /// - Waits only when the inbound queue is full (backpressure).
    /// - Returns [`BusError::Closed`] once `close()` has begun.
    pub async fn send(&self, event: E) -> Result<(), BusError> {
        self.send_arc(Arc::new(event)).await
    }

    /// Sends a pre-allocated `Arc<E>` (no extra allocation).
    pub async fn send_arc(&self, event: Arc<E>) -> Result<(), BusError> {
        self.enqueue(Command::Event(event)).await
    }

    /// Sends without waiting.
    ///
    /// Returns [`BusError::Full`] when the queue has no room, [`BusError::Closed`] after close.
    pub fn try_send(&self, event: E) -> Result<(), BusError> {
        let guard = self.shared.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = guard.as_ref().ok_or(BusError::Closed)?;
        tx.try_send(Command::Event(Arc::new(event)))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => BusError::Full,
                mpsc::error::TrySendError::Closed(_) => BusError::Closed,
            })
    }

    /// Registers a receiver; it observes every event sent after this call returns.
    ///
    /// Returns [`BusError::Closed`] once `close()` has begun. The manager calls the
    /// receiver's [`on_stop`](Receive::on_stop) exactly once when it closes.
    pub async fn add_receiver(&self, receiver: Arc<dyn Receive<E>>) -> Result<(), BusError> {
        self.enqueue(Command::Register(receiver)).await
    }

    /// Closes the bus and waits for the worker to finish.
    ///
    /// 1. Stops accepting sends and registrations.
    /// 2. Delivers every already-accepted event to all receivers.
    /// 3. Calls `on_stop` on each receiver exactly once (registration order).
    /// 4. Returns.
    ///
    /// A second call returns [`BusError::AlreadyClosed`] and does not touch receivers.
    pub async fn close(&self) -> Result<(), BusError> {
        let tx = self
            .shared
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(tx) = tx else {
            return Err(BusError::AlreadyClosed);
        };
        // Sends still waiting for a slot see `None` when they commit and give up.
        drop(tx);

        let worker = self.shared.worker.lock().await.take();
        if let Some(handle) = worker
            && let Err(err) = handle.await
        {
            warn!(error = %err, "event bus worker terminated abnormally");
        }
        Ok(())
    }

    /// Waits for a queue slot, then commits only if close has not begun meanwhile.
    async fn enqueue(&self, cmd: Command<E>) -> Result<(), BusError> {
        let tx = self.sender()?;
        let permit = tx.reserve().await.map_err(|_| BusError::Closed)?;
        let guard = self.shared.tx.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_none() {
            return Err(BusError::Closed);
        }
        permit.send(cmd);
        Ok(())
    }

    fn sender(&self) -> Result<mpsc::Sender<Command<E>>, BusError> {
        self.shared
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .cloned()
            .ok_or(BusError::Closed)
    }
}

impl<E> Manager<E> {
    /// Returns true once `close()` has begun.
    pub fn is_closed(&self) -> bool {
        self.shared
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Number of receivers the worker has registered so far.
    pub fn receiver_count(&self) -> usize {
        self.shared.receivers.load(Ordering::Acquire)
    }

    /// Inbound queue capacity (after clamping).
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }
}

impl<E> Default for Manager<E>
where
    E: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

/// Worker loop: owns the receiver list for the whole life of the bus.
async fn run_worker<E>(mut rx: mpsc::Receiver<Command<E>>, count: Arc<AtomicUsize>)
where
    E: Send + Sync + 'static,
{
    let mut receivers: Vec<Arc<dyn Receive<E>>> = Vec::new();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Register(receiver) => {
                trace!(receiver = receiver.name(), "receiver registered");
                receivers.push(receiver);
                count.store(receivers.len(), Ordering::Release);
            }
            Command::Event(event) => {
                if receivers.iter().any(|r| r.is_retired()) {
                    retire(&mut receivers).await;
                    count.store(receivers.len(), Ordering::Release);
                }
                trace!(receivers = receivers.len(), "fan-out");
                for receiver in &receivers {
                    let fut = receiver.on_event(event.as_ref());
                    if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        warn!(
                            receiver = receiver.name(),
                            info = %panic_message(&panic),
                            "receiver panicked on event"
                        );
                    }
                }
            }
        }
    }

    for receiver in &receivers {
        stop_receiver(receiver.as_ref()).await;
    }
    info!(receivers = receivers.len(), "event bus closed");
}

/// Drops retired receivers, stopping each one on the way out.
async fn retire<E>(receivers: &mut Vec<Arc<dyn Receive<E>>>)
where
    E: Send + Sync + 'static,
{
    let (retired, live): (Vec<_>, Vec<_>) = receivers.drain(..).partition(|r| r.is_retired());
    *receivers = live;
    for receiver in retired {
        debug!(receiver = receiver.name(), "receiver retired");
        stop_receiver(receiver.as_ref()).await;
    }
}

async fn stop_receiver<E>(receiver: &dyn Receive<E>)
where
    E: Send + Sync + 'static,
{
    let fut = receiver.on_stop();
    if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
        warn!(
            receiver = receiver.name(),
            info = %panic_message(&panic),
            "receiver panicked on stop"
        );
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
