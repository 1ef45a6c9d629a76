//! Garden configuration snapshot.
//!
//! All tunable parameters for the controller core.  The request/response
//! layer and the persistent store hand configuration in as JSON or postcard
//! blobs; everything is validated here, at the boundary, so the scheduler's
//! per-tick matching never sees a malformed entry.
//!
//! JSON field names match the device's HTTP API (`lightStart`,
//! `wateringSchedules`, ...).

use core::cell::RefCell;
use core::fmt;
use core::str::FromStr;
use std::sync::Arc;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::info;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::app::ports::ConfigProvider;
use crate::error::{Error, Result};

/// Number of watering valves on the relay board.
pub const VALVE_COUNT: usize = 4;
/// Number of soil-moisture sensor channels.
pub const SENSOR_COUNT: usize = 4;
/// Maximum number of watering schedule entries.
pub const MAX_SCHEDULES: usize = 8;
/// Longest single valve run accepted from config or the API (seconds).
pub const MAX_VALVE_SECS: u16 = 600;
/// Longest sensor power-up settle time accepted (milliseconds).
pub const MAX_SETTLE_MS: u32 = 2_000;
/// Soil log interval substituted when a stored config disables logging.
pub const DEFAULT_SOIL_LOG_INTERVAL_MIN: u8 = 15;

// ═══════════════════════════════════════════════════════════════
//  Time of day
// ═══════════════════════════════════════════════════════════════

/// A wall-clock minute, serialised as `"HH:MM"` (24 h).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    /// `None` unless `hour < 24` and `minute < 60`.
    pub const fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    pub const fn hour(self) -> u8 {
        self.hour
    }

    pub const fn minute(self) -> u8 {
        self.minute
    }

    /// Parse the strict `HH:MM` form used by schedule entries.
    pub fn parse(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return Err(Error::InvalidSchedule("time must be HH:MM"));
        }
        let digit = |b: u8| {
            b.is_ascii_digit()
                .then(|| b - b'0')
                .ok_or(Error::InvalidSchedule("time must be HH:MM"))
        };
        let hour = digit(bytes[0])? * 10 + digit(bytes[1])?;
        let minute = digit(bytes[3])? * 10 + digit(bytes[4])?;
        Self::new(hour, minute).ok_or(Error::InvalidSchedule("time out of range (00:00–23:59)"))
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        struct HhMm;

        impl Visitor<'_> for HhMm {
            type Value = TimeOfDay;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a time of day formatted HH:MM")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> core::result::Result<TimeOfDay, E> {
                TimeOfDay::parse(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(HhMm)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Schedule entries
// ═══════════════════════════════════════════════════════════════

/// One automatic watering run: a time of day and a duration per valve.
/// A zero duration skips that valve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub time: TimeOfDay,
    pub durations: [u16; VALVE_COUNT],
}

impl ScheduleEntry {
    pub fn validate(&self) -> Result<()> {
        if self.durations.iter().any(|&d| d > MAX_VALVE_SECS) {
            return Err(Error::InvalidSchedule("duration out of range (0–600)"));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Garden configuration
// ═══════════════════════════════════════════════════════════════

/// Core configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GardenConfig {
    /// Free-form growing mode label (e.g. "growing", "flowering").
    pub mode: heapless::String<16>,
    /// Hour (0-23) the grow lights switch on.
    #[serde(rename = "lightStart")]
    pub light_start_hour: u8,
    /// Hour (0-23) the grow lights switch off.
    #[serde(rename = "lightEnd")]
    pub light_end_hour: u8,
    /// Sensor power-up settle time before sampling (milliseconds).
    #[serde(rename = "sensorSettleTime")]
    pub sensor_settle_ms: u32,
    /// Soil log interval in minutes; 0 disables sampling.
    #[serde(rename = "soilLogIntervalMin")]
    pub soil_log_interval_min: u8,
    /// Automatic watering runs, matched once per minute.
    #[serde(rename = "wateringSchedules")]
    pub schedules: heapless::Vec<ScheduleEntry, MAX_SCHEDULES>,
}

impl Default for GardenConfig {
    fn default() -> Self {
        let mut mode = heapless::String::new();
        let _ = mode.push_str("growing");

        let mut schedules = heapless::Vec::new();
        for (hour, secs) in [(23, 45), (5, 30), (11, 30)] {
            if let Some(time) = TimeOfDay::new(hour, 0) {
                let _ = schedules.push(ScheduleEntry {
                    time,
                    durations: [secs; VALVE_COUNT],
                });
            }
        }

        Self {
            mode,
            light_start_hour: 23,
            light_end_hour: 17,
            sensor_settle_ms: 300,
            soil_log_interval_min: DEFAULT_SOIL_LOG_INTERVAL_MIN,
            schedules,
        }
    }
}

impl GardenConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let config: Self = serde_json::from_slice(bytes)
            .map_err(|_| Error::Config("malformed config document"))?;
        config.validate()?;
        Ok(config)
    }

    /// Range-check every field.  Rejects rather than clamps.
    pub fn validate(&self) -> Result<()> {
        if self.light_start_hour > 23 {
            return Err(Error::Config("lightStart must be 0–23"));
        }
        if self.light_end_hour > 23 {
            return Err(Error::Config("lightEnd must be 0–23"));
        }
        if self.sensor_settle_ms > MAX_SETTLE_MS {
            return Err(Error::Config("sensorSettleTime must be 0–2000 ms"));
        }
        if self.soil_log_interval_min > 60 {
            return Err(Error::Config("soilLogIntervalMin must be 0–60"));
        }
        self.schedules.iter().try_for_each(ScheduleEntry::validate)
    }

    /// Apply the boot-time safety default: a stored interval of zero would
    /// silently disable soil logging, so fall back to 15 minutes.
    pub fn normalized(mut self) -> Self {
        if self.soil_log_interval_min == 0 {
            self.soil_log_interval_min = DEFAULT_SOIL_LOG_INTERVAL_MIN;
        }
        self
    }

    /// Merge a partial update, validating the result as a whole.  Schedules
    /// are replaced only when every submitted entry is valid.
    pub fn merged(&self, update: &ConfigUpdate) -> Result<Self> {
        let mut next = self.clone();
        if let Some(mode) = &update.mode {
            next.mode = mode.clone();
        }
        if let Some(h) = update.light_start_hour {
            next.light_start_hour = h;
        }
        if let Some(h) = update.light_end_hour {
            next.light_end_hour = h;
        }
        if let Some(ms) = update.sensor_settle_ms {
            next.sensor_settle_ms = ms;
        }
        if let Some(min) = update.soil_log_interval_min {
            next.soil_log_interval_min = min;
        }
        if let Some(schedules) = &update.schedules {
            next.schedules = schedules.clone();
        }
        next.validate()?;
        Ok(next)
    }
}

/// Partial configuration update as posted by the API layer.
/// Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConfigUpdate {
    #[serde(default)]
    pub mode: Option<heapless::String<16>>,
    #[serde(default, rename = "lightStart")]
    pub light_start_hour: Option<u8>,
    #[serde(default, rename = "lightEnd")]
    pub light_end_hour: Option<u8>,
    #[serde(default, rename = "sensorSettleTime")]
    pub sensor_settle_ms: Option<u32>,
    #[serde(default, rename = "soilLogIntervalMin")]
    pub soil_log_interval_min: Option<u8>,
    #[serde(default, rename = "wateringSchedules")]
    pub schedules: Option<heapless::Vec<ScheduleEntry, MAX_SCHEDULES>>,
    /// Persist the merged config after applying it.
    #[serde(default)]
    pub save: bool,
}

// ═══════════════════════════════════════════════════════════════
//  Live snapshot cell
// ═══════════════════════════════════════════════════════════════

/// Holder of the live configuration.  Readers take an `Arc` snapshot that
/// stays consistent for a whole tick; writers swap in a new validated
/// config atomically between ticks.
pub struct ConfigCell {
    current: Mutex<CriticalSectionRawMutex, RefCell<Arc<GardenConfig>>>,
}

impl ConfigCell {
    pub fn new(config: GardenConfig) -> Self {
        Self {
            current: Mutex::new(RefCell::new(Arc::new(config))),
        }
    }

    pub fn snapshot(&self) -> Arc<GardenConfig> {
        self.current.lock(|c| Arc::clone(&c.borrow()))
    }

    /// Validate and swap in a new config.
    pub fn replace(&self, config: GardenConfig) -> Result<()> {
        config.validate()?;
        let next = Arc::new(config);
        self.current.lock(|c| *c.borrow_mut() = next);
        info!("Config: live snapshot replaced");
        Ok(())
    }
}

impl ConfigProvider for ConfigCell {
    fn current_config(&self) -> Arc<GardenConfig> {
        self.snapshot()
    }
}
