//! Runtime core: services, alarms and the runner loop.
//!
//! - [`service`]: the [`Service`] contract and [`ServiceRunnerControl`];
//! - [`alarm`]: [`DueTime`] and the runner's single [`Alarm`];
//! - [`runner`]: [`ServiceRunner`], one alarm-driven task per service;
//! - [`clock`]: injectable time sources;
//! - [`config`]: per-runner settings.

mod alarm;
mod clock;
mod config;
mod runner;
mod service;

pub use alarm::{Alarm, DueTime};
pub use clock::{Clock, SystemClock, TokioClock};
pub use config::RunnerConfig;
pub use runner::{RunnerHandle, ServiceRunner};
pub use service::{DueStream, Processed, Service, ServiceRunnerControl};
