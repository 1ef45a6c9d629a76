//! Fuzz target: `EventLog` ring buffer
//!
//! Drives arbitrary record / clear / drain / lookup sequences and verifies:
//! - No panics under arbitrary byte inputs
//! - The count never exceeds capacity
//! - The newest record always reads back at `count - 1`
//! - Lookups at or past the count are rejected
//!
//! cargo fuzz run fuzz_event_log

#![no_main]

use garden::event_log::{Event, EventLog};
use libfuzzer_sys::fuzz_target;

const CAPACITY: usize = 16;

fuzz_target!(|data: &[u8]| {
    let log: EventLog<CAPACITY> = EventLog::new();
    let mut clock: i64 = 0;

    for chunk in data.chunks(3) {
        let [op, a, b] = match chunk {
            [op, a, b] => [*op, *a, *b],
            _ => return,
        };
        clock += 1;
        match op % 8 {
            0 => log.clear(),
            1 => {
                let drained = log.take_all();
                assert!(drained.len() <= CAPACITY);
                assert_eq!(log.event_count(), 0);
            }
            2 => {
                let index = usize::from(a);
                assert_eq!(log.event_at(index).is_ok(), index < log.event_count());
            }
            n => {
                let e = if n % 2 == 0 {
                    Event::sensor_reading(clock, a % 4, u16::from_le_bytes([a, b]) % 4096)
                } else {
                    Event::watering(clock, a % 4, u16::from(b))
                };
                log.record(e);
                let count = log.event_count();
                assert!(count <= CAPACITY);
                assert_eq!(log.event_at(count - 1).ok(), Some(e));
            }
        }
    }
});
