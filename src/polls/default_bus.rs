//! # Process-wide poll bus.
//!
//! Application code that has no handle to pass around (request handlers, CLI
//! commands) publishes through this one installed [`Manager<PollEvent>`].
//!
//! ```text
//! main ──► install(Manager::new(..)) ──► send()/add_receiver() from anywhere
//! ```
//!
//! - `install` succeeds once; later calls hand the manager back.
//! - Everything else fails with [`BusError::NotInitialized`] before `install`.
//! - Tests should use a local [`Manager`] instead.

use std::sync::{Arc, OnceLock};

use crate::error::BusError;
use crate::events::Manager;
use crate::polls::event::PollEvent;
use crate::receivers::Receive;

static DEFAULT_BUS: OnceLock<Manager<PollEvent>> = OnceLock::new();

/// Installs the process-wide bus. Returns the manager back if one is already installed.
pub fn install(manager: Manager<PollEvent>) -> Result<(), Manager<PollEvent>> {
    DEFAULT_BUS.set(manager)
}

/// The installed bus.
pub fn manager() -> Result<&'static Manager<PollEvent>, BusError> {
    DEFAULT_BUS.get().ok_or(BusError::NotInitialized)
}

/// [`Manager::send`] on the installed bus.
pub async fn send(event: PollEvent) -> Result<(), BusError> {
    manager()?.send(event).await
}

/// [`Manager::add_receiver`] on the installed bus.
pub async fn add_receiver(receiver: Arc<dyn Receive<PollEvent>>) -> Result<(), BusError> {
    manager()?.add_receiver(receiver).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polls::model::PollId;
    use crate::polls::services::testkit::Recorder;

    // The only test in the crate that touches the process-wide bus.
    #[tokio::test]
    async fn install_once_then_publish() {
        assert_eq!(
            send(PollEvent::Created { poll: PollId(1) }).await,
            Err(BusError::NotInitialized)
        );
        assert!(manager().is_err());

        install(Manager::new(4)).unwrap();
        assert!(install(Manager::new(4)).is_err());

        let recorder = Arc::new(Recorder::default());
        add_receiver(recorder.clone()).await.unwrap();
        send(PollEvent::Created { poll: PollId(2) }).await.unwrap();
        manager().unwrap().close().await.unwrap();

        assert_eq!(recorder.seen(), vec![PollEvent::Created { poll: PollId(2) }]);
        assert_eq!(
            send(PollEvent::Created { poll: PollId(3) }).await,
            Err(BusError::Closed)
        );
    }
}
