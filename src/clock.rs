//! Wall-clock abstraction.
//!
//! The scheduler needs two views of "now": the UTC epoch second stamped
//! into log events, and the local calendar date/time used for rollover
//! and `HH:MM` schedule matching.  Both come from one [`WallTime`] sample
//! so a tick never mixes two clock reads.

use chrono::{DateTime, NaiveDateTime, Timelike};

/// One wall-clock sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallTime {
    /// Seconds since the Unix epoch (UTC).
    pub epoch_secs: i64,
    /// Local calendar date and time.
    pub local: NaiveDateTime,
}

impl WallTime {
    /// Build a sample from a local time and its offset from UTC.
    pub fn from_local(local: NaiveDateTime, utc_offset_secs: i32) -> Self {
        let epoch_secs = local.and_utc().timestamp() - i64::from(utc_offset_secs);
        Self { epoch_secs, local }
    }

    /// Sample for a UTC epoch second, rendered in UTC.
    pub fn from_epoch_utc(epoch_secs: i64) -> Option<Self> {
        let local = DateTime::from_timestamp(epoch_secs, 0)?.naive_utc();
        Some(Self { epoch_secs, local })
    }

    pub fn hour(&self) -> u8 {
        self.local.hour() as u8
    }

    pub fn minute(&self) -> u8 {
        self.local.minute() as u8
    }

    pub fn second(&self) -> u8 {
        self.local.second() as u8
    }
}

/// Source of wall-clock time.
///
/// Returns `None` until the clock has been synchronised (NTP or RTC);
/// the scheduler skips ticks while unsynced.
pub trait WallClock {
    fn now(&self) -> Option<WallTime>;

    /// Epoch seconds for event stamps; `0` while unsynced.
    fn epoch_secs(&self) -> i64 {
        self.now().map_or(0, |t| t.epoch_secs)
    }
}

impl<C: WallClock + ?Sized> WallClock for &C {
    fn now(&self) -> Option<WallTime> {
        (**self).now()
    }
}

impl<C: WallClock + ?Sized> WallClock for std::sync::Arc<C> {
    fn now(&self) -> Option<WallTime> {
        (**self).now()
    }
}
