//! Event distribution: the [`Manager`] bus.
//!
//! This module groups the bus used to publish and observe domain events between
//! request handlers, service runners and passive observers.
//!
//! ## Contents
//! - [`Manager`] bounded inbound queue plus one fan-out worker owning the receivers
//!
//! ## Quick reference
//! - **Producers**: request handlers, `ServiceRunner` services emitting follow-up events.
//! - **Consumers**: anything implementing [`Receive`](crate::Receive), in particular the
//!   private receiver each `ServiceRunner` registers.
//!
//! See `core/mod.rs` for the runner side of the wiring.

mod manager;

pub use manager::{DEFAULT_QUEUE_CAPACITY, Manager};
