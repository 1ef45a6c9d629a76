//! System wall-clock adapter.
//!
//! Implements [`WallClock`] for the controller.  Local time is UTC plus a
//! fixed offset; the board runs without DST rules.
//!
//! - **`target_os = "espidf"`**: `gettimeofday()`, which SNTP keeps in
//!   sync.  Anything before 2020 is treated as "not yet synced".
//! - **`not(target_os = "espidf")`**: the host clock via `chrono::Utc`.

use chrono::DateTime;

use crate::clock::{WallClock, WallTime};

/// Offset of the garden's local time from UTC (UTC+3).
pub const DEFAULT_UTC_OFFSET_SECS: i32 = 3 * 3_600;

/// Earliest epoch second accepted as a synchronised clock.
const EPOCH_2020: i64 = 1_577_836_800;

/// Wall clock plus monotonic uptime.
pub struct SystemClock {
    utc_offset_secs: i32,
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(DEFAULT_UTC_OFFSET_SECS)
    }
}

impl SystemClock {
    pub fn new(utc_offset_secs: i32) -> Self {
        Self {
            utc_offset_secs,
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Seconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_secs(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000_000
    }

    /// Seconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_secs(&self) -> u64 {
        self.start.elapsed().as_secs()
    }

    #[cfg(target_os = "espidf")]
    fn epoch_now(&self) -> Option<i64> {
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        // SAFETY: gettimeofday writes only into `tv`; a null timezone is allowed.
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return None;
        }
        Some(i64::from(tv.tv_sec))
    }

    #[cfg(not(target_os = "espidf"))]
    fn epoch_now(&self) -> Option<i64> {
        Some(chrono::Utc::now().timestamp())
    }

    /// Render an epoch second in this clock's local time.
    pub fn at(&self, epoch_secs: i64) -> Option<WallTime> {
        if epoch_secs < EPOCH_2020 {
            return None;
        }
        let local = DateTime::from_timestamp(epoch_secs + i64::from(self.utc_offset_secs), 0)?
            .naive_utc();
        Some(WallTime { epoch_secs, local })
    }
}

impl WallClock for SystemClock {
    fn now(&self) -> Option<WallTime> {
        self.epoch_now().and_then(|secs| self.at(secs))
    }
}
