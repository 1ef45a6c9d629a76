//! Application core boundary.
//!
//! Port traits the core consumes ([`ports`]), the structured events it
//! emits ([`events`]), and the service handle the API layer drives
//! ([`service`]).  Hardware only appears behind the ports, keeping the
//! scheduling and actuation logic testable without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
