//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to               |
//! |----------------|--------------------|---------------------------|
//! | `hardware`     | SensorPort         | Sensor relays, soil ADC   |
//! |                | ActuatorPort       | Valve relays, pump relay  |
//! | `log_sink`     | EventSink          | Serial log output         |
//! |                | ArchiveSink        | CSV dump to serial log    |
//! | `config_store` | ConfigPort         | NVS / in-memory store     |
//! | `time`         | WallClock          | SNTP-synced system clock  |

pub mod config_store;
pub mod hardware;
pub mod log_sink;
pub mod time;
