//! # Event receiver trait.
//!
//! Provides [`Receive`], the sink side of the [`Manager`](crate::Manager): it accepts
//! one event at a time and is told to stop exactly once when its manager closes.
//!
//! ## Architecture
//! ```text
//! Manager worker ──► receiver1.on_event(&E) ──► receiver2.on_event(&E) ──► ...
//!                    (awaited in registration order, one event at a time)
//!
//! Manager::close ──► receiver1.on_stop() ──► receiver2.on_stop() ──► ...
//! ```
//!
//! ## Rules
//! - A receiver is registered with exactly one manager, exactly once.
//! - Events arrive in send order (FIFO per receiver).
//! - `on_event` runs inside the manager worker: a slow receiver delays every other
//!   receiver on the same bus. Hand heavy work off to your own task or queue.
//! - `on_stop` is called exactly once, after the last event: when the manager closes,
//!   or earlier when the receiver reports itself retired.
//! - Panics are caught and logged; the worker keeps delivering.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use alarmvisor::Receive;
//!
//! #[derive(Debug)]
//! enum Shop { Ordered(u64), Shipped(u64) }
//!
//! struct Audit;
//!
//! #[async_trait]
//! impl Receive<Shop> for Audit {
//!     async fn on_event(&self, ev: &Shop) {
//!         if let Shop::Shipped(id) = ev {
//!             // write an audit row, etc.
//!             let _ = id;
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "audit" }
//! }
//! ```

use async_trait::async_trait;

/// Event sink registered on a [`Manager`](crate::Manager).
///
/// ### Implementation requirements
/// - Do not block on I/O inside [`on_event`](Self::on_event); enqueue and return.
/// - Handle errors internally; do not panic.
#[async_trait]
pub trait Receive<E>: Send + Sync + 'static {
    /// Accepts a single event, called from the manager worker.
    async fn on_event(&self, event: &E);

    /// Permanent stop, called exactly once when the manager closes.
    ///
    /// Default: no-op.
    async fn on_stop(&self) {}

    /// True once the receiver wants no more events.
    ///
    /// Checked by the manager worker before each event; a retired receiver is dropped
    /// and gets its [`on_stop`](Self::on_stop) then. Default: never retires.
    fn is_retired(&self) -> bool {
        false
    }

    /// Returns the receiver name used in logs.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose - override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
