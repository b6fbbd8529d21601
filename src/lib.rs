//! # alarmvisor
//!
//! **Alarmvisor** runs background jobs over many long-lived, time-driven entities
//! (polls, reminders, leases) without scanning everything on a timer.
//!
//! Each job is a [`Service`] driven by a [`ServiceRunner`] that keeps one best-known
//! alarm and sleeps until it. Domain events published on a [`Manager`] let runners
//! wake earlier when a state change makes an entity due sooner; a periodic full
//! rescan catches anything the events missed.
//!
//! ## Architecture
//! ```text
//!   producers (handlers, runners)
//!        │ send(E)
//!        ▼
//! ┌──────────────────────────────────────────────┐
//! │ Manager<E>: bounded FIFO ──► single worker   │
//! └───────┬──────────────────┬───────────────────┘
//!         ▼                  ▼                  (any Receive<E>, e.g. LogReceiver)
//!   filter_event(&E)   filter_event(&E)
//!         │ inbox            │ inbox
//!         ▼                  ▼
//! ┌────────────────┐  ┌────────────────┐
//! │ ServiceRunner  │  │ ServiceRunner  │   one tokio task each
//! │  alarm ◄─ min  │  │  alarm ◄─ min  │
//! └───────┬────────┘  └───────┬────────┘
//!         ▼                   ▼
//!   Service (check_all / check_one / process_one) ──► store
//! ```
//!
//! ### Runner cycle
//! ```text
//! start ──► check_all() ──► alarm = min(due)
//! loop {
//!   ├─ event  ──► receive_event ──► check_one(scheduled) ──► alarm = min(alarm, due)
//!   ├─ alarm  ──► check_all() ──► process_one(due ids, by due time)
//!   │             └─► alarm = min(fresh due times, now + check_interval)
//!   └─ stop   ──► exit
//! }
//! ```
//!
//! ## Features
//! | Area          | Description                                             | Key types / traits                         |
//! |---------------|---------------------------------------------------------|--------------------------------------------|
//! | **Bus**       | Async fan-out with backpressure and a shutdown barrier. | [`Manager`], [`Receive`], [`LogReceiver`]  |
//! | **Runners**   | Alarm-driven loop per service.                          | [`Service`], [`ServiceRunner`], [`DueTime`]|
//! | **Time**      | Injectable clocks for deterministic tests.              | [`Clock`], [`TokioClock`]                  |
//! | **Policies**  | Jitter for fallback rescans.                            | [`JitterPolicy`]                           |
//! | **Errors**    | Typed errors with stable labels.                        | [`BusError`], [`ServiceError`], [`RuntimeError`] |
//! | **Polls**     | Poll start/advance/close on top of the runtime.        | [`polls::PollScheduler`]                   |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use alarmvisor::{Config, LogReceiver, Manager};
//! use alarmvisor::polls::{MemoryStore, Poll, PollEvent, PollId, PollScheduler};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config::default();
//!     let bus: Manager<PollEvent> = Manager::new(cfg.bus_capacity_clamped());
//!     bus.add_receiver(Arc::new(LogReceiver::new("polls"))).await?;
//!
//!     let scheduler = PollScheduler::start(Arc::new(MemoryStore::new()), bus, &cfg).await?;
//!     let soon = chrono::Utc::now() + chrono::Duration::seconds(5);
//!     scheduler.create_poll(Poll::new(PollId(1), "standup", soon).with_quorum(3)).await?;
//!
//!     scheduler.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod policies;
mod receivers;

pub mod polls;

// ---- Public re-exports ----

pub use config::{Config, DEFAULT_CHECK_INTERVAL};
pub use core::{
    Alarm, Clock, DueStream, DueTime, Processed, RunnerConfig, RunnerHandle, Service,
    ServiceRunner, ServiceRunnerControl, SystemClock, TokioClock,
};
pub use error::{BoxError, BusError, RuntimeError, ServiceError};
pub use events::{DEFAULT_QUEUE_CAPACITY, Manager};
pub use policies::JitterPolicy;
pub use receivers::{LogReceiver, Receive};
