//! Application service: the query and command surface of the core.
//!
//! [`GardenService`] bundles the shared handles (event log, interlock, soil
//! statistics, live config) and exposes the operations the request/response
//! layer needs.  It is cheap to clone; every clone talks to the same state.
//! None of the clones can take or finish a watering run: that right stays
//! with the [`RunReceiver`] returned once by [`GardenService::new`].
//!
//! ```text
//!   API layer ──▶ ┌─────────────────────────┐ ──▶ EventSink
//!                 │      GardenService      │
//!   ConfigPort ◀──│ log · interlock · config│
//!                 └─────────────────────────┘
//! ```

use core::fmt::Write as _;
use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;

use crate::config::{ConfigCell, ConfigUpdate, GardenConfig};
use crate::error::{Error, Result};
use crate::event_log::{Event, EventLog, LogEntry};
use crate::interlock::{ActuationInterlock, ActuationRequest, RunReceiver};
use crate::sampling::{SampleRequests, SoilReadings, SoilSample};
use crate::scheduler::{LightWindow, Scheduler};

use super::events::AppEvent;
use super::ports::{ConfigPort, EventSink};

// ───────────────────────────────────────────────────────────────
// Status report
// ───────────────────────────────────────────────────────────────

/// Point-in-time status, serialised with the device API's field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub mode: heapless::String<16>,
    pub light_start: u8,
    pub light_end: u8,
    pub sensor_settle_time: u32,
    pub soil_log_interval_min: u8,
    pub soil_humidity_last: SoilSample,
    pub soil_humidity_min: SoilSample,
    pub soil_humidity_max: SoilSample,
    /// Epoch seconds of the latest soil sample, if any since rollover.
    pub last_reading_timestamp: Option<i64>,
    pub uptime: heapless::String<24>,
    pub pump_active: bool,
    pub event_count: usize,
}

/// Body of an on-demand soil read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReport {
    pub soil_readings_last: SoilSample,
}

/// Render seconds as `1d 17h 1m 37s`.
pub fn format_uptime(secs: u64) -> heapless::String<24> {
    let mut out = heapless::String::new();
    // u64::MAX seconds renders in 22 bytes.
    let _ = write!(
        out,
        "{}d {}h {}m {}s",
        secs / 86_400,
        (secs % 86_400) / 3_600,
        (secs % 3_600) / 60,
        secs % 60
    );
    out
}

// ───────────────────────────────────────────────────────────────
// GardenService
// ───────────────────────────────────────────────────────────────

/// Handles to the core's shared state, injected into every task.
#[derive(Clone)]
pub struct GardenService {
    log: Arc<EventLog>,
    interlock: Arc<ActuationInterlock>,
    readings: Arc<SoilReadings>,
    reads: Arc<SampleRequests>,
    config: Arc<ConfigCell>,
}

impl GardenService {
    /// Fresh core state around an already-validated config, plus the
    /// receive side of its interlock for the watering executor.
    pub fn new(config: GardenConfig) -> (Self, RunReceiver) {
        let (interlock, runs) = ActuationInterlock::new();
        let service = Self {
            log: Arc::new(EventLog::new()),
            interlock,
            readings: Arc::new(SoilReadings::new()),
            reads: Arc::new(SampleRequests::new()),
            config: Arc::new(ConfigCell::new(config)),
        };
        (service, runs)
    }

    pub fn event_log(&self) -> &Arc<EventLog> {
        &self.log
    }

    pub fn config_cell(&self) -> &Arc<ConfigCell> {
        &self.config
    }

    /// A scheduler wired to this service's log, interlock, statistics and
    /// read requests.
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(
            Arc::clone(&self.log),
            Arc::clone(&self.interlock),
            Arc::clone(&self.readings),
            Arc::clone(&self.reads),
        )
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&self, sink: &mut impl EventSink) {
        let window = LightWindow::from_config(&self.config.snapshot());
        sink.emit(&AppEvent::Started {
            window_start: window.start_hour,
            window_end: window.end_hour,
        });
        info!(
            "GardenService started (window {:02}:00–{:02}:00)",
            window.start_hour, window.end_hour
        );
    }

    // ── Event log queries ─────────────────────────────────────

    pub fn event_count(&self) -> usize {
        self.log.event_count()
    }

    pub fn event_at(&self, index: usize) -> Result<Event> {
        self.log.event_at(index)
    }

    /// All retained events, oldest first, as flat log entries.
    pub fn events(&self) -> Vec<LogEntry> {
        self.log.snapshot().iter().map(LogEntry::from).collect()
    }

    // ── Watering ──────────────────────────────────────────────

    pub fn try_start(&self, request: ActuationRequest) -> Result<()> {
        self.interlock.try_start(request)
    }

    /// Manual watering with one duration per valve, in valve order
    /// (`duration0..3`).  Non-positive durations skip that valve.
    pub fn start_watering(&self, durations: &[i32], sink: &mut impl EventSink) -> Result<()> {
        let pairs: Vec<(usize, i32)> = durations.iter().copied().enumerate().collect();
        let request = ActuationRequest::from_pairs(&pairs)?;
        let valves = request.active_valves();

        match self.interlock.try_start(request) {
            Ok(()) => {
                info!("Manual watering accepted ({} valve(s))", valves);
                sink.emit(&AppEvent::WateringStarted {
                    schedule: None,
                    valves,
                });
                Ok(())
            }
            Err(e) => {
                warn!("Manual watering rejected: {}", e);
                Err(e)
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.interlock.is_busy()
    }

    // ── Soil sensors ──────────────────────────────────────────

    /// Ask the scheduler task for a fresh read on its next tick.  Returns
    /// `false` when a read was already queued.
    pub fn request_sample(&self) -> bool {
        self.reads.request()
    }

    /// Read every sensor now and return the averaged values.  Refreshes the
    /// status report's latest readings; the event log is untouched.
    ///
    /// Completes on the scheduler tick that serves the request.  One caller
    /// at a time.
    pub async fn read_sensors(&self) -> SensorReport {
        self.reads.request();
        SensorReport {
            soil_readings_last: self.reads.wait().await,
        }
    }

    // ── Configuration ─────────────────────────────────────────

    pub fn config(&self) -> Arc<GardenConfig> {
        self.config.snapshot()
    }

    /// Merge `update` into the live config and swap it in; persist it when
    /// the update asks for it.  Nothing changes if the merge fails validation.
    pub fn update_config(
        &self,
        update: &ConfigUpdate,
        store: &impl ConfigPort,
    ) -> Result<Arc<GardenConfig>> {
        let next = self.config.snapshot().merged(update)?;
        self.config.replace(next)?;
        let live = self.config.snapshot();

        if update.save {
            store.save(&live).map_err(|e| {
                warn!("Config applied but not persisted: {}", e);
                Error::from(e)
            })?;
            info!("Config persisted");
        }
        Ok(live)
    }

    /// Erase the stored config and fall back to the defaults.
    pub fn reset_config(&self, store: &impl ConfigPort) -> Result<Arc<GardenConfig>> {
        store.reset().map_err(|e| {
            warn!("Config reset failed: {}", e);
            Error::from(e)
        })?;
        self.config.replace(GardenConfig::default())?;
        info!("Config reset to defaults");
        Ok(self.config.snapshot())
    }

    // ── Status ────────────────────────────────────────────────

    pub fn status(&self, uptime_secs: u64) -> StatusReport {
        let config = self.config.snapshot();
        let stats = self.readings.snapshot();
        StatusReport {
            mode: config.mode.clone(),
            light_start: config.light_start_hour,
            light_end: config.light_end_hour,
            sensor_settle_time: config.sensor_settle_ms,
            soil_log_interval_min: config.soil_log_interval_min,
            soil_humidity_last: stats.last,
            soil_humidity_min: stats.min,
            soil_humidity_max: stats.max,
            last_reading_timestamp: stats.last_sample_at,
            uptime: format_uptime(uptime_secs),
            pump_active: self.interlock.is_busy(),
            event_count: self.log.event_count(),
        }
    }
}
