//! Worker tasks.
//!
//! Two long-lived tasks run the core:
//!
//! ```text
//!   scheduler (1 Hz)                    watering
//!   ────────────────                    ────────
//!   clock.now()                         block_on(runs.next())
//!   config snapshot                     executor.execute(request)
//!   scheduler.tick(..) ──try_start──▶   drop run (busy = false)
//!   serve_read_request(..)
//!   watchdog.feed()
//! ```
//!
//! The request crosses between them by value over the interlock's channel,
//! so starting a run never blocks a tick or an API call.

use std::io;
use std::thread::JoinHandle;

use embedded_hal::delay::DelayNs;
use log::debug;

use crate::app::ports::{ActuatorPort, ArchiveSink, ConfigProvider, EventSink};
use crate::clock::WallClock;
use crate::config::{MAX_SETTLE_MS, SENSOR_COUNT};
use crate::drivers::delay::TaskDelay;
use crate::drivers::task_pin::{spawn_on_core, Core, TaskSpec};
use crate::drivers::watchdog::TaskWatchdog;
use crate::interlock::{RunReceiver, WateringExecutor};
use crate::sampling::{SoilProbe, SAMPLES_PER_CHANNEL, SAMPLE_SPACING_MS};
use crate::scheduler::{Scheduler, TickOutcome};

/// Scheduler tick period.
pub const TICK_MS: u32 = 1_000;

/// Longest one full soil sample can block, at the maximum settle time.
pub const SAMPLE_BUDGET_MS: u32 =
    SENSOR_COUNT as u32 * (MAX_SETTLE_MS + SAMPLES_PER_CHANNEL * SAMPLE_SPACING_MS);

/// Scheduler watchdog timeout.  A tick may take a scheduled sample and an
/// on-demand read back to back.
pub const SCHEDULER_WATCHDOG_MS: u32 = 2 * SAMPLE_BUDGET_MS + TICK_MS + 10_000;

pub const SCHEDULER_TASK: TaskSpec = TaskSpec {
    name: "scheduler\0",
    core: Core::App,
    priority: 5,
    stack_kb: 8,
};

pub const WATERING_TASK: TaskSpec = TaskSpec {
    name: "watering\0",
    core: Core::App,
    priority: 6,
    stack_kb: 6,
};

// ───────────────────────────────────────────────────────────────
// Scheduler loop
// ───────────────────────────────────────────────────────────────

/// Everything one scheduler tick needs, owned by the scheduler task.
pub struct SchedulerLoop<G, C, P, R, E> {
    pub scheduler: Scheduler,
    pub config: G,
    pub clock: C,
    pub probe: P,
    pub archive: R,
    pub sink: E,
}

impl<G, C, P, R, E> SchedulerLoop<G, C, P, R, E>
where
    G: ConfigProvider,
    C: WallClock,
    P: SoilProbe,
    R: ArchiveSink,
    E: EventSink,
{
    /// One tick.  `None` while the wall clock is unsynced; a pending
    /// on-demand read is served either way.
    pub fn run_once(&mut self) -> Option<TickOutcome> {
        let config = self.config.current_config();
        let now = self.clock.now();
        let outcome = match now {
            Some(now) => Some(self.scheduler.tick(
                &now,
                &config,
                &mut self.probe,
                &mut self.archive,
                &mut self.sink,
            )),
            None => {
                debug!("Scheduler: clock not synced, tick skipped");
                None
            }
        };
        self.scheduler
            .serve_read_request(&config, &mut self.probe, now.map(|t| t.epoch_secs));
        outcome
    }
}

/// Spawn the 1 Hz scheduler task.  The task enrols itself with the task
/// watchdog and feeds it every tick.
pub fn spawn_scheduler<G, C, P, R, E>(
    mut task: SchedulerLoop<G, C, P, R, E>,
) -> io::Result<JoinHandle<()>>
where
    G: ConfigProvider + Send + 'static,
    C: WallClock + Send + 'static,
    P: SoilProbe + Send + 'static,
    R: ArchiveSink + Send + 'static,
    E: EventSink + Send + 'static,
{
    spawn_on_core::<()>(SCHEDULER_TASK, move || {
        let mut watchdog = TaskWatchdog::subscribe(SCHEDULER_WATCHDOG_MS);
        let mut delay = TaskDelay;
        loop {
            task.run_once();
            watchdog.feed();
            delay.delay_ms(TICK_MS);
        }
    })
}

// ───────────────────────────────────────────────────────────────
// Watering worker
// ───────────────────────────────────────────────────────────────

/// Spawn the task that executes accepted watering requests.  The task takes
/// the interlock's only [`RunReceiver`] with it.
pub fn spawn_watering_worker<A, D, C>(
    mut executor: WateringExecutor<A, D, C>,
    runs: RunReceiver,
) -> io::Result<JoinHandle<()>>
where
    A: ActuatorPort + Send + 'static,
    D: DelayNs + Send + 'static,
    C: WallClock + Send + 'static,
{
    spawn_on_core::<()>(WATERING_TASK, move || executor.serve(runs))
}
