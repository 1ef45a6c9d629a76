//! Garden controller firmware library.
//!
//! Exposes the scheduling, logging and actuation core for integration
//! testing and host simulation. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod clock;
pub mod config;
pub mod event_log;
pub mod interlock;
pub mod pins;
pub mod runtime;
pub mod sampling;
pub mod scheduler;

mod error;

// Hardware-facing modules; the actual peripheral access is guarded by cfg
// attributes inside, with atomics standing in on the host.
pub mod adapters;
pub mod drivers;

pub use error::{Error, OutOfRange, Result};
