//! Actuation interlock and watering executor.
//!
//! At most one watering run exists at a time.  [`ActuationInterlock::try_start`]
//! claims the `busy` flag and hands the request, by value, to the executor
//! task over a one-slot channel; the caller never blocks.  The executor owns
//! the pump and valve outputs and the single [`RunReceiver`], so it alone
//! takes requests off the channel and clears the flag after the last valve.
//!
//! ```text
//!  Scheduler ─┐                      ┌──────────────────┐
//!             ├─▶ try_start ─▶ [1] ─▶│ WateringExecutor │─▶ ActuatorPort
//!  API ───────┘    (busy CAS)        │  open · pump ·   │─▶ EventLog
//!                                    │  hold · close    │
//!                                    └────────┬─────────┘
//!                                             └─▶ RunReceiver: release
//! ```
//!
//! There is no rollback: a run interrupted by a reset leaves the outputs to
//! the actuator driver, which switches everything off on construction.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embedded_hal::delay::DelayNs;
use log::{debug, info, warn};

use crate::app::ports::ActuatorPort;
use crate::clock::WallClock;
use crate::config::{MAX_VALVE_SECS, VALVE_COUNT};
use crate::error::{Error, OutOfRange, Result};
use crate::event_log::{Event, EventLog};

/// Extra hold after the requested duration so the valve is fully shut
/// before the pump stops.
pub const SAFETY_BUFFER_SECS: u32 = 5;
/// Pause after each executed valve before the next one opens.
pub const INTER_VALVE_SETTLE_SECS: u32 = 5;
/// Most valve runs one request may carry.
pub const MAX_RUNS: usize = 8;

// ═══════════════════════════════════════════════════════════════
//  Requests
// ═══════════════════════════════════════════════════════════════

/// One `(valve, seconds)` pair.  Zero seconds means skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValveRun {
    pub valve: u8,
    pub duration_secs: u16,
}

/// An ordered list of valve runs, validated on construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActuationRequest {
    runs: heapless::Vec<ValveRun, MAX_RUNS>,
}

impl ActuationRequest {
    /// One run per valve, in valve order, from a schedule entry's durations.
    ///
    /// Entries are range-checked at the config boundary, so this only
    /// clamps as a last guard.
    pub fn from_durations(durations: &[u16; VALVE_COUNT]) -> Self {
        let mut runs = heapless::Vec::new();
        for (valve, &secs) in durations.iter().enumerate() {
            // VALVE_COUNT <= MAX_RUNS, so the push cannot fail.
            let _ = runs.push(ValveRun {
                valve: valve as u8,
                duration_secs: secs.min(MAX_VALVE_SECS),
            });
        }
        Self { runs }
    }

    /// Build from ad-hoc `(valve, seconds)` pairs.
    ///
    /// Non-positive durations are kept as skips.  An unknown valve, a
    /// duration above the safety limit, or too many pairs is rejected.
    pub fn from_pairs(pairs: &[(usize, i32)]) -> Result<Self> {
        if pairs.len() > MAX_RUNS {
            return Err(OutOfRange::RunCount(pairs.len()).into());
        }
        let mut runs = heapless::Vec::new();
        for &(valve, secs) in pairs {
            if valve >= VALVE_COUNT {
                return Err(OutOfRange::Valve(valve).into());
            }
            if secs > i32::from(MAX_VALVE_SECS) {
                return Err(OutOfRange::Duration(secs as u32).into());
            }
            let _ = runs.push(ValveRun {
                valve: valve as u8,
                duration_secs: secs.max(0) as u16,
            });
        }
        Ok(Self { runs })
    }

    pub fn runs(&self) -> &[ValveRun] {
        &self.runs
    }

    /// Number of runs that will actually open a valve.
    pub fn active_valves(&self) -> usize {
        self.runs.iter().filter(|r| r.duration_secs > 0).count()
    }

    /// Total time the executor will hold the resource, in seconds.
    pub fn total_secs(&self) -> u32 {
        self.runs
            .iter()
            .filter(|r| r.duration_secs > 0)
            .map(|r| u32::from(r.duration_secs) + SAFETY_BUFFER_SECS + INTER_VALVE_SETTLE_SECS)
            .sum()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Interlock
// ═══════════════════════════════════════════════════════════════

/// Single-writer guard over the pump and valves.
///
/// Callers only ever see the submit side.  The receive side, and with it the
/// right to clear `busy`, lives in the [`RunReceiver`] handed out once by
/// [`ActuationInterlock::new`].
pub struct ActuationInterlock {
    busy: AtomicBool,
    pending: Channel<CriticalSectionRawMutex, ActuationRequest, 1>,
}

impl ActuationInterlock {
    /// A new interlock and its only receiver.
    pub fn new() -> (Arc<Self>, RunReceiver) {
        let interlock = Arc::new(Self {
            busy: AtomicBool::new(false),
            pending: Channel::new(),
        });
        let runs = RunReceiver {
            interlock: Arc::clone(&interlock),
        };
        (interlock, runs)
    }

    /// Accept `request` if no run is active; otherwise drop it with
    /// [`Error::Busy`].  Never blocks and never queues.
    pub fn try_start(&self, request: ActuationRequest) -> Result<()> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::Busy);
        }

        let valves = request.active_valves();
        if self.pending.try_send(request).is_err() {
            // `busy` was clear, so the slot should be empty.
            warn!("Interlock: request slot occupied, rejecting");
            self.busy.store(false, Ordering::Release);
            return Err(Error::Busy);
        }
        info!("Interlock: run accepted ({} valve(s))", valves);
        Ok(())
    }

    /// `true` from acceptance until the executor finishes the run.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn release(&self) {
        self.busy.store(false, Ordering::Release);
        info!("Interlock: released");
    }
}

/// Receive side of an [`ActuationInterlock`].  Not `Clone`: whoever owns it
/// is the executor.
pub struct RunReceiver {
    interlock: Arc<ActuationInterlock>,
}

impl RunReceiver {
    /// Wait for the next accepted request.
    pub(crate) async fn next(&self) -> ActiveRun<'_> {
        let request = self.interlock.pending.receive().await;
        ActiveRun { request, owner: self }
    }

    /// Take the accepted request, if any, without waiting.
    pub(crate) fn try_next(&self) -> Option<ActiveRun<'_>> {
        let request = self.interlock.pending.try_receive().ok()?;
        Some(ActiveRun { request, owner: self })
    }
}

/// A request taken off the channel.  The interlock stays busy until this is
/// dropped, on every path.
pub(crate) struct ActiveRun<'a> {
    request: ActuationRequest,
    owner: &'a RunReceiver,
}

impl core::ops::Deref for ActiveRun<'_> {
    type Target = ActuationRequest;

    fn deref(&self) -> &ActuationRequest {
        &self.request
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.owner.interlock.release();
    }
}

// ═══════════════════════════════════════════════════════════════
//  Executor
// ═══════════════════════════════════════════════════════════════

/// Runs accepted requests against the actuators, one valve at a time.
pub struct WateringExecutor<A, D, C> {
    actuators: A,
    delay: D,
    clock: C,
    log: Arc<EventLog>,
}

impl<A: ActuatorPort, D: DelayNs, C: WallClock> WateringExecutor<A, D, C> {
    /// Takes ownership of the actuators and drives every output off.
    pub fn new(mut actuators: A, delay: D, clock: C, log: Arc<EventLog>) -> Self {
        actuators.all_off();
        Self {
            actuators,
            delay,
            clock,
            log,
        }
    }

    /// Execute one request to completion.  Returns the number of valves run.
    pub fn execute(&mut self, request: &ActuationRequest) -> usize {
        let mut executed = 0;
        for run in request.runs() {
            if run.duration_secs == 0 {
                debug!("Executor: valve {} skipped", run.valve);
                continue;
            }
            let valve = usize::from(run.valve);

            self.actuators.set_valve(valve, true);
            self.actuators.set_pump(true);
            self.log
                .record(Event::watering(self.clock.epoch_secs(), run.valve, run.duration_secs));
            info!("Executor: valve {} open for {}s", run.valve, run.duration_secs);

            self.delay
                .delay_ms((u32::from(run.duration_secs) + SAFETY_BUFFER_SECS) * 1_000);

            self.actuators.set_pump(false);
            self.actuators.set_valve(valve, false);
            self.delay.delay_ms(INTER_VALVE_SETTLE_SECS * 1_000);
            executed += 1;
        }
        info!("Executor: run complete ({} valve(s))", executed);
        executed
    }

    /// Execute the pending request, if one was accepted, and release the
    /// interlock.  Returns `false` when nothing was pending.
    pub fn run_pending(&mut self, runs: &RunReceiver) -> bool {
        match runs.try_next() {
            Some(run) => {
                self.execute(&run);
                true
            }
            None => false,
        }
    }

    /// Worker loop: wait for requests and execute them forever.
    pub fn serve(&mut self, runs: RunReceiver) -> ! {
        loop {
            let run = futures_lite::future::block_on(runs.next());
            self.execute(&run);
        }
    }

    pub fn actuators(&self) -> &A {
        &self.actuators
    }
}
