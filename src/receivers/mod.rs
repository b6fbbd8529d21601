//! # Event receivers.
//!
//! This module provides the [`Receive`] trait (the sink side of the
//! [`Manager`](crate::Manager)) and a built-in [`LogReceiver`].
//!
//! ## Receiver types
//! - **Passive receivers** - observe events (logging, audit, metrics).
//! - **Scheduling receivers** - the private receiver each
//!   [`ServiceRunner`](crate::ServiceRunner) registers; it filters events through the
//!   service's relevance predicate and forwards them to the runner's inbox.

mod log;
mod receive;

pub use log::LogReceiver;
pub use receive::Receive;
