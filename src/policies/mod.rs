//! Scheduling policies.
//!
//! ## Contents
//! - [`JitterPolicy`] randomization of the periodic rescan interval
//!
//! ## Quick wiring
//! ```text
//! RunnerConfig { rescan_jitter: JitterPolicy, .. }
//!      └─► core::runner uses rescan_jitter.apply(service.check_interval())
//!          to place the next fallback wake
//! ```

mod jitter;

pub use jitter::JitterPolicy;
