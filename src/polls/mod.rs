//! # Poll scheduling on top of the runtime.
//!
//! Polls move through timed transitions (start, advance round, close). Each
//! transition is one [`Service`](crate::Service) driven by its own
//! [`ServiceRunner`](crate::ServiceRunner); all of them share one
//! [`Manager<PollEvent>`](crate::Manager) and one [`PollStore`].
//!
//! - [`model`]: [`Poll`], [`PollState`] and the due-time rules
//! - [`PollEvent`]: the closed set of domain events
//! - [`PollStore`] / [`MemoryStore`]: compare-and-set storage
//! - [`StartPollService`], [`AdvanceRoundService`], [`ClosePollService`]
//! - [`PollScheduler`]: starts the three runners and shuts them down
//! - [`default_bus`]: optional process-wide bus
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use alarmvisor::{Config, Manager};
//! use alarmvisor::polls::{MemoryStore, Poll, PollId, PollScheduler};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = Config::default();
//! let scheduler = PollScheduler::start(
//!     Arc::new(MemoryStore::new()),
//!     Manager::new(cfg.bus_capacity_clamped()),
//!     &cfg,
//! )
//! .await?;
//!
//! scheduler.create_poll(Poll::new(PollId(1), "lunch", chrono::Utc::now())).await?;
//! scheduler.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod default_bus;
mod error;
mod event;
pub mod model;
mod scheduler;
mod services;
mod store;

pub use error::{PollError, StoreError};
pub use event::PollEvent;
pub use model::{Poll, PollId, PollState};
pub use scheduler::{PollScheduler, cast_vote, create_poll};
pub use services::{AdvanceRoundService, ClosePollService, PollContext, StartPollService};
pub use store::{MemoryStore, PollStore};
