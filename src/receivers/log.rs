//! # LogReceiver: event tracer
//!
//! A minimal receiver that writes every incoming event to `tracing` at debug level.
//! Use it for diagnostics or demos.
//!
//! ## Example output
//! ```text
//! DEBUG alarmvisor::receivers::log: event receiver="polls" event=Started { poll: PollId(7) }
//! DEBUG alarmvisor::receivers::log: event receiver="polls" event=VoteCast { poll: PollId(7), round: 1 }
//! INFO  alarmvisor::receivers::log: receiver stopped receiver="polls" seen=2
//! ```

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::receivers::Receive;

/// Event tracer receiver.
#[derive(Debug)]
pub struct LogReceiver {
    label: &'static str,
    seen: AtomicU64,
}

impl LogReceiver {
    /// Construct a new [`LogReceiver`] whose log lines carry `label`.
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            seen: AtomicU64::new(0),
        }
    }

    /// Number of events observed so far.
    pub fn seen(&self) -> u64 {
        self.seen.load(Ordering::Relaxed)
    }
}

impl Default for LogReceiver {
    fn default() -> Self {
        Self::new("log")
    }
}

#[async_trait]
impl<E> Receive<E> for LogReceiver
where
    E: Debug + Send + Sync + 'static,
{
    async fn on_event(&self, event: &E) {
        self.seen.fetch_add(1, Ordering::Relaxed);
        debug!(receiver = self.label, ?event, "event");
    }

    async fn on_stop(&self) {
        info!(receiver = self.label, seen = self.seen(), "receiver stopped");
    }

    fn name(&self) -> &'static str {
        self.label
    }
}
