//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Scheduler / Interlock / GardenService
//! ```
//!
//! Driven adapters (relay board, ADC, config storage, archive, event sinks)
//! implement these traits.  The core consumes them via generics, so the
//! scheduling and actuation logic never touches hardware directly.
//!
//! Hardware calls are fail-silent: a relay that does not switch or an ADC
//! channel that reads garbage is not reported back to the core.

use std::sync::Arc;

use crate::config::GardenConfig;
use crate::event_log::Event;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Soil sensor channels: per-channel power switching and raw ADC reads.
pub trait SensorPort {
    /// One raw ADC conversion (0–4095) on sensor channel `index`.
    fn read_channel(&mut self, index: usize) -> u16;

    /// Switch the supply of sensor channel `index`.
    fn set_sensor_power(&mut self, index: usize, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Valves and the shared pump.
///
/// Only the watering executor drives these while a run is active.
pub trait ActuatorPort {
    fn set_valve(&mut self, index: usize, open: bool);

    fn set_pump(&mut self, on: bool);

    /// Pump off, then every valve closed.
    fn all_off(&mut self) {
        self.set_pump(false);
        for valve in 0..crate::config::VALVE_COUNT {
            self.set_valve(valve, false);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration ports
// ───────────────────────────────────────────────────────────────

/// Read-only access to the live configuration snapshot.
pub trait ConfigProvider {
    fn current_config(&self) -> Arc<GardenConfig>;
}

impl<T: ConfigProvider + ?Sized> ConfigProvider for Arc<T> {
    fn current_config(&self) -> Arc<GardenConfig> {
        (**self).current_config()
    }
}

/// Loads and persists garden configuration.
///
/// Implementations MUST validate before persisting.  Invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], not clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`GardenConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<GardenConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &GardenConfig) -> Result<(), ConfigError>;

    /// Erase the stored configuration.  The next [`load`](Self::load)
    /// returns the defaults.
    fn reset(&self) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Archive port (driven adapter: domain → durable storage)
// ───────────────────────────────────────────────────────────────

/// Export hook invoked at rollover with the day's events, oldest first.
///
/// A failure is logged by the caller; the rollover proceeds regardless.
pub trait ArchiveSink {
    fn archive(&mut self, events: &[Event]) -> Result<(), ArchiveError>;
}

/// Archive sink that discards everything.
pub struct NoArchive;

impl ArchiveSink for NoArchive {
    fn archive(&mut self, _events: &[Event]) -> Result<(), ArchiveError> {
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`ArchiveSink`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveError {
    /// Archive medium missing or not mounted.
    Unavailable,
    /// Write to the archive failed part-way.
    WriteFailed,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "archive unavailable"),
            Self::WriteFailed => write!(f, "archive write failed"),
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for ArchiveError {}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::Corrupted => Self::Config("stored config corrupted"),
            ConfigError::IoError => Self::Config("config storage I/O error"),
        }
    }
}
