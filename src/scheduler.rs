//! Daily cycle scheduler.
//!
//! Driven once per second with a wall-clock sample.  Each tick evaluates
//! three guards, in order, against absolute local time rather than tick
//! counts, so late ticks still fire and repeated ticks within a minute do
//! not fire twice.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Scheduler.tick(now)                     │
//! │                                                              │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────┐  │
//! │  │ Daily rollover │  │ Soil sampling  │  │ Schedule match │  │
//! │  │ start:00:0x    │  │ in window,     │  │ once per       │  │
//! │  │ once per day   │  │ min % interval │  │ minute, HH:MM  │  │
//! │  └───────┬────────┘  └───────┬────────┘  └───────┬────────┘  │
//! │          │                   │                   │           │
//! │          ▼                   ▼                   ▼           │
//! │   EventLog.take_all    SoilProbe → EventLog   Interlock      │
//! │   → ArchiveSink        → SoilReadings         .try_start     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The light window opens one hour before `lightStart` and closes at
//! `lightEnd`, wrapping midnight when needed.  The log rolls over when the
//! window opens.
//!
//! On-demand reads are served by [`Scheduler::serve_read_request`], which
//! the task calls every tick whether or not the clock is synced.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{ArchiveSink, EventSink};
use crate::clock::WallTime;
use crate::config::{GardenConfig, TimeOfDay};
use crate::error::Error;
use crate::event_log::{Event, EventLog};
use crate::interlock::{ActuationInterlock, ActuationRequest};
use crate::sampling::{SampleRequests, SoilProbe, SoilReadings, SoilSample};

/// Seconds into the window's first minute during which rollover may fire.
pub const ROLLOVER_GRACE_SECS: u8 = 10;

// ═══════════════════════════════════════════════════════════════
//  Light window
// ═══════════════════════════════════════════════════════════════

/// Hour range during which soil sampling is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightWindow {
    /// First hour inside the window (0-23).
    pub start_hour: u8,
    /// First hour past the window (0-23).
    pub end_hour: u8,
}

impl LightWindow {
    /// Window for a config: opens one hour before `lightStart`.
    pub fn from_config(config: &GardenConfig) -> Self {
        Self {
            start_hour: (config.light_start_hour % 24 + 23) % 24,
            end_hour: config.light_end_hour,
        }
    }

    /// Check if the given hour is within the window.
    pub fn contains(&self, hour: u8) -> bool {
        if self.start_hour < self.end_hour {
            // e.g., 6..20 (daytime window)
            hour >= self.start_hour && hour < self.end_hour
        } else {
            // e.g., 22..17 (wraps around midnight)
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler state
// ═══════════════════════════════════════════════════════════════

/// Guard markers owned by the scheduler.
///
/// Minute markers are full local date-times truncated to the minute, so
/// the same `HH:MM` on the next day is a fresh minute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayCycleState {
    pub last_rollover_day: Option<NaiveDate>,
    pub last_sampled_minute: Option<NaiveDateTime>,
    pub last_schedule_minute: Option<NaiveDateTime>,
}

/// Result of a schedule match in one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WateringMatch {
    /// The interlock accepted the run.
    Started(TimeOfDay),
    /// A run was already active; the match was dropped.
    Busy(TimeOfDay),
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub rolled_over: bool,
    pub sampled: bool,
    pub watering: Option<WateringMatch>,
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

/// The daily cycle scheduler.
///
/// Holds handles to the shared log, interlock, and soil statistics; all
/// hardware access goes through the ports passed to [`tick`](Self::tick).
pub struct Scheduler {
    log: Arc<EventLog>,
    interlock: Arc<ActuationInterlock>,
    readings: Arc<SoilReadings>,
    reads: Arc<SampleRequests>,
    state: DayCycleState,
}

impl Scheduler {
    pub fn new(
        log: Arc<EventLog>,
        interlock: Arc<ActuationInterlock>,
        readings: Arc<SoilReadings>,
        reads: Arc<SampleRequests>,
    ) -> Self {
        Self {
            log,
            interlock,
            readings,
            reads,
            state: DayCycleState::default(),
        }
    }

    pub fn state(&self) -> &DayCycleState {
        &self.state
    }

    /// Evaluate rollover, sampling, and schedule matching for `now`.
    ///
    /// `config` must stay the same snapshot for the whole tick.
    pub fn tick(
        &mut self,
        now: &WallTime,
        config: &GardenConfig,
        probe: &mut impl SoilProbe,
        archive: &mut impl ArchiveSink,
        sink: &mut impl EventSink,
    ) -> TickOutcome {
        let window = LightWindow::from_config(config);
        let minute = now
            .local
            .date()
            .and_hms_opt(u32::from(now.hour()), u32::from(now.minute()), 0)
            .unwrap_or(now.local);

        TickOutcome {
            rolled_over: self.check_rollover(now, window, archive, sink),
            sampled: self.check_sampling(now, minute, window, config, probe, sink),
            watering: self.check_schedules(now, minute, config, sink),
        }
    }

    /// Take a pending on-demand read, sample every channel and refresh the
    /// latest reading.  Writes nothing to the event log.
    pub fn serve_read_request(
        &mut self,
        config: &GardenConfig,
        probe: &mut impl SoilProbe,
        timestamp: Option<i64>,
    ) -> Option<SoilSample> {
        if !self.reads.take() {
            return None;
        }
        let sample = probe.sample_all(config.sensor_settle_ms);
        self.readings.set_last(&sample, timestamp);
        self.reads.complete(sample);
        debug!("Scheduler: on-demand soil read {:?}", sample);
        Some(sample)
    }

    // ── Daily rollover ────────────────────────────────────────

    fn check_rollover(
        &mut self,
        now: &WallTime,
        window: LightWindow,
        archive: &mut impl ArchiveSink,
        sink: &mut impl EventSink,
    ) -> bool {
        let today = now.local.date();
        let at_window_open = now.hour() == window.start_hour
            && now.minute() == 0
            && now.second() < ROLLOVER_GRACE_SECS;
        if !at_window_open || self.state.last_rollover_day == Some(today) {
            return false;
        }

        // Drain first so events recorded during archival land in the new day.
        let events = self.log.take_all();
        let archive_ok = if events.is_empty() {
            true
        } else {
            match archive.archive(&events) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Scheduler: archive of {} events failed: {}", events.len(), e);
                    false
                }
            }
        };
        self.readings.reset();
        self.state.last_rollover_day = Some(today);

        info!("Scheduler: daily rollover for {} ({} events)", today, events.len());
        sink.emit(&AppEvent::LogRolledOver {
            archived: events.len(),
            archive_ok,
        });
        true
    }

    // ── Soil sampling ─────────────────────────────────────────

    fn check_sampling(
        &mut self,
        now: &WallTime,
        minute: NaiveDateTime,
        window: LightWindow,
        config: &GardenConfig,
        probe: &mut impl SoilProbe,
        sink: &mut impl EventSink,
    ) -> bool {
        let interval = config.soil_log_interval_min;
        if interval == 0 || !window.contains(now.hour()) {
            return false;
        }
        if now.minute() % interval != 0 || self.state.last_sampled_minute == Some(minute) {
            return false;
        }
        self.state.last_sampled_minute = Some(minute);

        // Settle and sample delays run here, outside the log's lock.
        let sample = probe.sample_all(config.sensor_settle_ms);
        for (sensor, &value) in sample.iter().enumerate() {
            self.log
                .record(Event::sensor_reading(now.epoch_secs, sensor as u8, value));
        }
        self.readings.update(&sample, now.epoch_secs);

        debug!("Scheduler: soil sample {:?}", sample);
        sink.emit(&AppEvent::SoilSampled(sample));
        true
    }

    // ── Watering schedule match ───────────────────────────────

    fn check_schedules(
        &mut self,
        now: &WallTime,
        minute: NaiveDateTime,
        config: &GardenConfig,
        sink: &mut impl EventSink,
    ) -> Option<WateringMatch> {
        if self.state.last_schedule_minute == Some(minute) {
            return None;
        }
        self.state.last_schedule_minute = Some(minute);

        let time = TimeOfDay::new(now.hour(), now.minute())?;
        let mut first = None;
        for entry in config.schedules.iter().filter(|e| e.time == time) {
            let request = ActuationRequest::from_durations(&entry.durations);
            let valves = request.active_valves();
            let outcome = match self.interlock.try_start(request) {
                Ok(()) => {
                    info!("Scheduler: {} schedule started", time);
                    sink.emit(&AppEvent::WateringStarted {
                        schedule: Some(time),
                        valves,
                    });
                    WateringMatch::Started(time)
                }
                Err(Error::Busy) => {
                    warn!("Scheduler: {} schedule dropped, pump already active", time);
                    sink.emit(&AppEvent::WateringSkipped { schedule: time });
                    WateringMatch::Busy(time)
                }
                Err(e) => {
                    warn!("Scheduler: {} schedule rejected: {}", time, e);
                    continue;
                }
            };
            first.get_or_insert(outcome);
        }
        first
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
