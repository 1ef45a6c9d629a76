//! Per-task watchdog.
//!
//! [`TaskWatchdog::subscribe`] enrols the *calling* task with the ESP-IDF
//! task watchdog (TWDT) for a given timeout; dropping the handle removes it
//! again, so it must be dropped on the task that created it.  The handle
//! also remembers when it was last fed, which is all the host build has.

use std::time::{Duration, Instant};

use log::{info, warn};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::{
    esp_err_t, esp_task_wdt_add, esp_task_wdt_config_t, esp_task_wdt_delete,
    esp_task_wdt_reconfigure, esp_task_wdt_reset, ESP_OK,
};

/// Subscription of one task.  `!Send`: the TWDT keys subscriptions by task
/// handle.
pub struct TaskWatchdog {
    timeout: Duration,
    last_feed: Instant,
    #[cfg(target_os = "espidf")]
    enrolled: bool,
    _task_bound: core::marker::PhantomData<*const ()>,
}

impl TaskWatchdog {
    /// Enrol the calling task.  Enrolment failure is logged and the handle
    /// still tracks feed times.
    pub fn subscribe(timeout_ms: u32) -> Self {
        #[cfg(target_os = "espidf")]
        let enrolled = enrol_current_task(timeout_ms);

        #[cfg(not(target_os = "espidf"))]
        info!("Watchdog(sim): tracking {} ms timeout", timeout_ms);

        Self {
            timeout: Duration::from_millis(u64::from(timeout_ms)),
            last_feed: Instant::now(),
            #[cfg(target_os = "espidf")]
            enrolled,
            _task_bound: core::marker::PhantomData,
        }
    }

    /// Reset the countdown.  A feed that arrives past the timeout is logged.
    pub fn feed(&mut self) {
        let gap = self.since_last_feed();
        if gap > self.timeout {
            warn!(
                "Watchdog: fed {} ms after a {} ms timeout",
                gap.as_millis(),
                self.timeout.as_millis()
            );
        }

        #[cfg(target_os = "espidf")]
        {
            if self.enrolled {
                // SAFETY: resets the calling task's own subscription.
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }

        self.last_feed = Instant::now();
    }

    pub fn since_last_feed(&self) -> Duration {
        self.last_feed.elapsed()
    }

    /// `true` once the task has gone longer than the timeout unfed.
    pub fn overdue(&self) -> bool {
        self.since_last_feed() > self.timeout
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Drop for TaskWatchdog {
    fn drop(&mut self) {
        #[cfg(target_os = "espidf")]
        {
            if self.enrolled {
                // SAFETY: removes the calling task, which enrolled itself.
                let ret = unsafe { esp_task_wdt_delete(core::ptr::null_mut()) };
                if ret != ESP_OK as esp_err_t {
                    warn!("Watchdog: unsubscribe failed ({})", ret);
                }
            }
        }
    }
}

#[cfg(target_os = "espidf")]
fn enrol_current_task(timeout_ms: u32) -> bool {
    let cfg = esp_task_wdt_config_t {
        timeout_ms,
        idle_core_mask: 0,
        trigger_panic: true,
    };
    // SAFETY: plain FFI calls; the TWDT is initialised by the IDF startup code.
    let ret = unsafe { esp_task_wdt_reconfigure(&cfg) };
    if ret != ESP_OK as esp_err_t {
        warn!("Watchdog: TWDT reconfigure returned {}", ret);
    }
    let ret = unsafe { esp_task_wdt_add(core::ptr::null_mut()) };
    if ret == ESP_OK as esp_err_t {
        info!("Watchdog: task enrolled, {} ms timeout", timeout_ms);
        true
    } else {
        warn!("Watchdog: enrolment failed ({})", ret);
        false
    }
}
