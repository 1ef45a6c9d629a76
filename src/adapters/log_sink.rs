//! Log-based event sink and archive adapters.
//!
//! [`LogEventSink`] implements [`EventSink`] by writing structured
//! application events to the logger (UART / USB-CDC in production).
//! [`LogArchive`] implements [`ArchiveSink`] by dumping the day's events as
//! CSV lines (`timestamp,event,value`) to the same output, ready to be
//! scraped off the serial console.

use core::fmt::Write as _;

use log::info;

use crate::app::events::AppEvent;
use crate::app::ports::{ArchiveError, ArchiveSink, EventSink};
use crate::event_log::Event;

/// Header line of the CSV archive.
pub const CSV_HEADER: &str = "timestamp,event,value";

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started {
                window_start,
                window_end,
            } => {
                info!("START | window={:02}:00-{:02}:00", window_start, window_end);
            }
            AppEvent::LogRolledOver {
                archived,
                archive_ok,
            } => {
                info!(
                    "ROLLOVER | archived={} | archive={}",
                    archived,
                    if *archive_ok { "OK" } else { "FAILED" }
                );
            }
            AppEvent::SoilSampled(sample) => {
                info!(
                    "SAMPLE | s0={} s1={} s2={} s3={}",
                    sample[0], sample[1], sample[2], sample[3]
                );
            }
            AppEvent::WateringStarted { schedule, valves } => match schedule {
                Some(time) => info!("WATER | start | schedule={} | valves={}", time, valves),
                None => info!("WATER | start | manual | valves={}", valves),
            },
            AppEvent::WateringSkipped { schedule } => {
                info!("WATER | skipped | schedule={} | pump busy", schedule);
            }
        }
    }
}

/// One CSV archive line for `event`.
pub fn csv_line(event: &Event) -> heapless::String<48> {
    let mut line = heapless::String::new();
    // i64 (20) + label (20) + u32 (10) + separators overflows only for
    // timestamps far outside the clock's range.
    let _ = write!(line, "{},{},{}", event.timestamp, event.type_name(), event.value());
    line
}

/// Archive adapter that writes the day's events to the log as CSV.
#[derive(Default)]
pub struct LogArchive {
    archived_total: usize,
}

impl LogArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events archived since boot.
    pub fn archived_total(&self) -> usize {
        self.archived_total
    }
}

impl ArchiveSink for LogArchive {
    fn archive(&mut self, events: &[Event]) -> Result<(), ArchiveError> {
        info!("ARCHIVE | {}", CSV_HEADER);
        for event in events {
            info!("ARCHIVE | {}", csv_line(event));
        }
        self.archived_total += events.len();
        Ok(())
    }
}
