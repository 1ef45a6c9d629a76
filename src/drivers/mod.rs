//! Hardware initialisation, task spawning, delays, and the watchdog.

pub mod delay;
pub mod hw_init;
pub mod task_pin;
pub mod watchdog;
