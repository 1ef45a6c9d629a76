//! Blocking delay provider for worker tasks.
//!
//! The scheduler's settle/sample waits and the executor's valve holds block
//! their own task only.  On ESP-IDF this yields to FreeRTOS; on the host it
//! sleeps the thread.

#[cfg(target_os = "espidf")]
pub use esp_idf_hal::delay::FreeRtos as TaskDelay;

/// Thread-sleeping [`DelayNs`](embedded_hal::delay::DelayNs) for host builds.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskDelay;

#[cfg(not(target_os = "espidf"))]
impl embedded_hal::delay::DelayNs for TaskDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}
