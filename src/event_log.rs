//! Bounded event history.
//!
//! Fixed-capacity ring of timestamped sensor/watering events.  When full, the
//! oldest event is overwritten.  Callers only see logical indices
//! (`0` = oldest retained, `count - 1` = newest); the ring mapping stays
//! private.
//!
//! ```text
//!   physical:  [ D | B | C ]        head = 1, count = 3
//!                    ^ next write
//!   logical:     0 → B, 1 → C, 2 → D
//! ```
//!
//! Every operation runs inside one short critical section over the in-memory
//! ring.  Nothing that blocks (sensor settle, valve hold, archival I/O) ever
//! runs while it is held.

use core::cell::RefCell;
use core::fmt::Write as _;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use serde::{Deserialize, Serialize};

use crate::error::{OutOfRange, Result};

/// Default number of retained events.
pub const LOG_CAPACITY: usize = 512;

// ═══════════════════════════════════════════════════════════════
//  Event types
// ═══════════════════════════════════════════════════════════════

/// What an [`Event`] records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Averaged ADC reading (0–4095) from one soil sensor channel.
    SensorReading { sensor: u8, value: u16 },
    /// One valve activation, with the requested (not buffered) duration.
    WateringAction { valve: u8, duration_secs: u16 },
    #[default]
    Unknown,
}

/// An immutable, timestamped log record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Wall-clock seconds since the Unix epoch (0 if the clock was unsynced).
    pub timestamp: i64,
    pub kind: EventKind,
}

impl Event {
    pub const fn sensor_reading(timestamp: i64, sensor: u8, value: u16) -> Self {
        Self {
            timestamp,
            kind: EventKind::SensorReading { sensor, value },
        }
    }

    pub const fn watering(timestamp: i64, valve: u8, duration_secs: u16) -> Self {
        Self {
            timestamp,
            kind: EventKind::WateringAction {
                valve,
                duration_secs,
            },
        }
    }

    /// Type label used by the logs endpoint and the CSV archive,
    /// e.g. `SOIL_READING_2` or `WATERING_0`.
    pub fn type_name(&self) -> heapless::String<20> {
        let mut name = heapless::String::new();
        // 20 bytes always fit the longest label, `SOIL_READING_255`.
        let _ = match self.kind {
            EventKind::SensorReading { sensor, .. } => write!(name, "SOIL_READING_{sensor}"),
            EventKind::WateringAction { valve, .. } => write!(name, "WATERING_{valve}"),
            EventKind::Unknown => name.write_str("UNKNOWN"),
        };
        name
    }

    /// Reading magnitude or watering duration; `0` for unknown events.
    pub const fn value(&self) -> u32 {
        match self.kind {
            EventKind::SensorReading { value, .. } => value as u32,
            EventKind::WateringAction { duration_secs, .. } => duration_secs as u32,
            EventKind::Unknown => 0,
        }
    }
}

/// Flattened, serialisable view of one event for the API layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub timestamp: i64,
    pub event: heapless::String<20>,
    pub value: u32,
}

impl From<&Event> for LogEntry {
    fn from(e: &Event) -> Self {
        Self {
            timestamp: e.timestamp,
            event: e.type_name(),
            value: e.value(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Ring storage
// ═══════════════════════════════════════════════════════════════

/// Backing storage plus the `(head, count)` pair.  `head` is the physical
/// slot the next record lands in.
struct Ring<const N: usize> {
    slots: [Event; N],
    head: usize,
    count: usize,
}

impl<const N: usize> Ring<N> {
    const fn new() -> Self {
        const EMPTY: Event = Event {
            timestamp: 0,
            kind: EventKind::Unknown,
        };
        Self {
            slots: [EMPTY; N],
            head: 0,
            count: 0,
        }
    }

    fn push(&mut self, event: Event) {
        self.slots[self.head] = event;
        self.head = (self.head + 1) % N;
        if self.count < N {
            self.count += 1;
        }
    }

    fn physical(&self, logical: usize) -> usize {
        (self.head + N - self.count + logical) % N
    }

    fn get(&self, logical: usize) -> Option<Event> {
        (logical < self.count).then(|| self.slots[self.physical(logical)])
    }

    fn reset(&mut self) {
        self.head = 0;
        self.count = 0;
    }

    fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        (0..self.count).map(|i| self.slots[self.physical(i)])
    }
}

// ═══════════════════════════════════════════════════════════════
//  Event log
// ═══════════════════════════════════════════════════════════════

/// Concurrency-safe bounded event log.
///
/// Share it behind an `Arc`; all methods take `&self`.
pub struct EventLog<const N: usize = LOG_CAPACITY> {
    ring: Mutex<CriticalSectionRawMutex, RefCell<Ring<N>>>,
}

impl<const N: usize> EventLog<N> {
    pub const fn new() -> Self {
        const { assert!(N > 0, "event log capacity must be non-zero") };
        Self {
            ring: Mutex::new(RefCell::new(Ring::new())),
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Append an event, overwriting the oldest one when full.  Never fails.
    pub fn record(&self, event: Event) {
        self.ring.lock(|r| r.borrow_mut().push(event));
    }

    pub fn event_count(&self) -> usize {
        self.ring.lock(|r| r.borrow().count)
    }

    /// Event at logical `index` (`0` = oldest retained).
    pub fn event_at(&self, index: usize) -> Result<Event> {
        self.ring.lock(|r| {
            let ring = r.borrow();
            ring.get(index).ok_or(
                OutOfRange::LogIndex {
                    index,
                    count: ring.count,
                }
                .into(),
            )
        })
    }

    /// Forget every retained event.  Backing slots are not scrubbed.
    pub fn clear(&self) {
        self.ring.lock(|r| r.borrow_mut().reset());
    }

    /// Consistent oldest-to-newest copy of the retained events.
    pub fn snapshot(&self) -> Vec<Event> {
        let mut out = Vec::with_capacity(N);
        self.ring.lock(|r| out.extend(r.borrow().iter()));
        out
    }

    /// Copy out and clear in one critical section, so nothing recorded
    /// between the copy and the clear is lost.
    pub fn take_all(&self) -> Vec<Event> {
        let mut out = Vec::with_capacity(N);
        self.ring.lock(|r| {
            let mut ring = r.borrow_mut();
            out.extend(ring.iter());
            ring.reset();
        });
        out
    }
}

impl<const N: usize> Default for EventLog<N> {
    fn default() -> Self {
        Self::new()
    }
}
