//! Garden controller firmware: main entry point.
//!
//! Hexagonal layout with two worker tasks around a shared core.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SoilSensorBoard  WateringRelays  ConfigStore  SystemClock     │
//! │  (SensorPort)     (ActuatorPort)  (ConfigPort) (WallClock)     │
//! │  LogEventSink     LogArchive                                   │
//! │  (EventSink)      (ArchiveSink)                                │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │           GardenService (shared handles)               │    │
//! │  │  EventLog · ActuationInterlock · ConfigCell            │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  scheduler task (1 Hz) ──request──▶ watering task              │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;

use anyhow::Result;
use embedded_hal::delay::DelayNs;
use log::{error, info, warn};

use garden::adapters::config_store::ConfigStore;
use garden::adapters::hardware::RelayBoard;
use garden::adapters::log_sink::{LogArchive, LogEventSink};
use garden::adapters::time::SystemClock;
use garden::app::ports::ConfigPort;
use garden::app::service::GardenService;
use garden::config::GardenConfig;
use garden::drivers::delay::TaskDelay;
use garden::drivers::hw_init;
use garden::interlock::WateringExecutor;
use garden::runtime::{self, SchedulerLoop};
use garden::sampling::SensorBank;

/// Period of the status line on the console.
const STATUS_INTERVAL_MS: u32 = 60_000;

fn init_logging() -> Result<()> {
    #[cfg(target_os = "espidf")]
    {
        esp_idf_svc::sys::link_patches();
        esp_idf_logger::init()?;
    }

    #[cfg(not(target_os = "espidf"))]
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    Ok(())
}

fn load_config() -> GardenConfig {
    let loaded = ConfigStore::new().and_then(|store| store.load());
    match loaded {
        Ok(cfg) => cfg.normalized(),
        Err(e) => {
            warn!("Config load failed ({}), using defaults", e);
            GardenConfig::default()
        }
    }
}

fn main() -> Result<()> {
    // ── 1. Bootstrap ──────────────────────────────────────────
    init_logging()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Garden controller v{}            ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    hw_init::init_peripherals().inspect_err(|e| error!("HAL init failed: {}", e))?;

    // ── 2. Config + shared core ───────────────────────────────
    let config = load_config();
    info!(
        "Config: mode={} | {} schedule(s) | settle={} ms | soil log every {} min",
        config.mode,
        config.schedules.len(),
        config.sensor_settle_ms,
        config.soil_log_interval_min
    );

    let (service, runs) = GardenService::new(config);
    let mut log_sink = LogEventSink::new();
    service.start(&mut log_sink);

    let clock = Arc::new(SystemClock::default());

    // ── 3. Adapters ───────────────────────────────────────────
    let (sensors, relays) = RelayBoard::split();
    let probe = SensorBank::new(sensors, TaskDelay);
    let executor = WateringExecutor::new(
        relays,
        TaskDelay,
        Arc::clone(&clock),
        Arc::clone(service.event_log()),
    );

    // ── 4. Worker tasks ───────────────────────────────────────
    let _watering = runtime::spawn_watering_worker(executor, runs)?;
    let _scheduler = runtime::spawn_scheduler(SchedulerLoop {
        scheduler: service.scheduler(),
        config: Arc::clone(service.config_cell()),
        clock: Arc::clone(&clock),
        probe,
        archive: LogArchive::new(),
        sink: LogEventSink::new(),
    })?;

    info!("System ready.");

    // ── 5. Status loop ────────────────────────────────────────
    let mut delay = TaskDelay;
    loop {
        delay.delay_ms(STATUS_INTERVAL_MS);
        let status = service.status(clock.uptime_secs());
        match serde_json::to_string(&status) {
            Ok(json) => info!("STATUS | {}", json),
            Err(e) => warn!("STATUS | encode failed: {}", e),
        }
    }
}
