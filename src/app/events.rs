//! Outbound application events.
//!
//! The scheduler and [`GardenService`](super::service::GardenService) emit
//! these through the [`EventSink`](super::ports::EventSink) port.  Adapters
//! on the other side decide what to do with them.

use crate::config::TimeOfDay;
use crate::sampling::SoilSample;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The service came up; carries the effective light window.
    Started { window_start: u8, window_end: u8 },

    /// The daily rollover drained the log.
    LogRolledOver {
        /// Events handed to the archive before the reset.
        archived: usize,
        /// Whether the archive hook reported success.
        archive_ok: bool,
    },

    /// One soil sample (averaged reading per channel) was logged.
    SoilSampled(SoilSample),

    /// A watering run was accepted by the interlock.
    WateringStarted {
        /// Matched schedule time, or `None` for a manual request.
        schedule: Option<TimeOfDay>,
        valves: usize,
    },

    /// A matched schedule was dropped because a run was already active.
    WateringSkipped { schedule: TimeOfDay },
}
