//! Error types used by the alarmvisor bus, runners and services.
//!
//! This module defines three enums:
//!
//! - [`BusError`]: failures of [`Manager`](crate::Manager) operations (send, register, close).
//! - [`ServiceError`]: failures raised by a [`Service`](crate::Service) while querying its store.
//! - [`RuntimeError`]: failures of runner lifecycle management (start, stop).
//!
//! All of them provide `as_label` for logs/metrics.

use std::time::Duration;
use thiserror::Error;

/// Boxed error carried verbatim from a service's own data access.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// # Errors produced by the event bus.
///
/// Returned synchronously to the caller of `send`/`add_receiver`/`close`; never swallowed.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The bus is closing or closed; the operation was not accepted.
    #[error("event bus is closed")]
    Closed,

    /// `close` was called on a bus that was already closed (or closing).
    #[error("event bus already closed")]
    AlreadyClosed,

    /// The inbound queue is full (only returned by non-waiting `try_send`).
    #[error("event bus queue is full")]
    Full,

    /// The process-wide default bus was used before it was installed.
    #[error("default event bus is not initialized")]
    NotInitialized,
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use alarmvisor::BusError;
    ///
    /// assert_eq!(BusError::Closed.as_label(), "bus_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::Closed => "bus_closed",
            BusError::AlreadyClosed => "bus_already_closed",
            BusError::Full => "bus_full",
            BusError::NotInitialized => "bus_not_initialized",
        }
    }
}

/// # Errors produced by a service while checking or processing an entity.
///
/// The runner logs these and treats the cycle as "nothing learned" for that entity;
/// they never stop the runner. "Nothing to do yet" is not an error: see
/// [`Processed::NothingToDoYet`](crate::Processed::NothingToDoYet).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Store/query failure, carried verbatim.
    #[error("store error: {source}")]
    Store {
        /// The data-access error as raised by the store.
        #[source]
        source: BoxError,
    },

    /// Any other failure reported by the service.
    #[error("service failed: {error}")]
    Failed {
        /// Human-readable failure message.
        error: String,
    },
}

impl ServiceError {
    /// Wraps a store error.
    pub fn store(err: impl Into<BoxError>) -> Self {
        ServiceError::Store { source: err.into() }
    }

    /// Creates a generic failure from a message.
    pub fn failed(error: impl Into<String>) -> Self {
        ServiceError::Failed {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceError::Store { .. } => "service_store",
            ServiceError::Failed { .. } => "service_failed",
        }
    }
}

/// # Errors produced while starting or stopping runners.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The runner could not register its receiver on the bus.
    #[error("bus rejected runner: {0}")]
    Bus(#[from] BusError),

    /// Stop grace period exceeded; the listed runners were still busy and got aborted.
    #[error("stop timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of the runners that did not stop in time.
        stuck: Vec<String>,
    },

    /// A runner worker panicked.
    #[error("runner {name} panicked")]
    RunnerPanicked {
        /// Name of the service the runner was driving.
        name: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use alarmvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Bus(_) => "runtime_bus",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::RunnerPanicked { .. } => "runtime_runner_panicked",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("disk on fire")]
    struct Disk;

    #[test]
    fn store_error_keeps_source() {
        let err = ServiceError::store(Disk);
        assert_eq!(err.as_label(), "service_store");
        assert_eq!(err.to_string(), "store error: disk on fire");
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("disk on fire"));
    }

    #[test]
    fn bus_error_converts_into_runtime_error() {
        let err: RuntimeError = BusError::Closed.into();
        assert!(matches!(err, RuntimeError::Bus(BusError::Closed)));
        assert_eq!(err.as_label(), "runtime_bus");
    }
}
