//! Integration tests for the actuation interlock and the watering executor,
//! including the cross-thread hand-off the firmware uses.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;

use garden::event_log::{Event, EventLog};
use garden::interlock::{
    ActuationInterlock, ActuationRequest, WateringExecutor, INTER_VALVE_SETTLE_SECS,
    SAFETY_BUFFER_SECS,
};
use garden::runtime::spawn_watering_worker;
use garden::{Error, OutOfRange};

use crate::mock_hw::{at, ActuatorCall, CountingDelay, FixedClock, MockActuators};

fn request(durations: [u16; 4]) -> ActuationRequest {
    ActuationRequest::from_durations(&durations)
}

// ── Mutual exclusion ──────────────────────────────────────────

#[test]
fn concurrent_try_start_admits_exactly_one() {
    for _ in 0..50 {
        let (interlock, _runs) = ActuationInterlock::new();
        let barrier = Arc::new(Barrier::new(2));
        let accepted = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let interlock = Arc::clone(&interlock);
                let barrier = Arc::clone(&barrier);
                let accepted = Arc::clone(&accepted);
                thread::spawn(move || {
                    barrier.wait();
                    match interlock.try_start(request([10, 0, 0, 0])) {
                        Ok(()) => {
                            accepted.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(e) => assert_eq!(e, Error::Busy),
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(accepted.load(Ordering::SeqCst), 1);
        assert!(interlock.is_busy());
    }
}

/// Delay that samples the interlock's busy flag on every wait.
struct BusyWatchDelay {
    interlock: Arc<ActuationInterlock>,
    busy_seen: Vec<bool>,
}

impl DelayNs for BusyWatchDelay {
    fn delay_ns(&mut self, _ns: u32) {
        self.busy_seen.push(self.interlock.is_busy());
    }

    fn delay_ms(&mut self, _ms: u32) {
        self.busy_seen.push(self.interlock.is_busy());
    }
}

#[test]
fn busy_from_acceptance_until_sequence_completes() {
    let (interlock, runs) = ActuationInterlock::new();
    let mut watch = BusyWatchDelay {
        interlock: Arc::clone(&interlock),
        busy_seen: Vec::new(),
    };
    assert!(!interlock.is_busy());

    interlock.try_start(request([5, 5, 0, 5])).unwrap();
    assert!(interlock.is_busy());
    assert_eq!(interlock.try_start(request([1, 0, 0, 0])), Err(Error::Busy));

    {
        let mut executor = WateringExecutor::new(
            MockActuators::new(),
            &mut watch,
            FixedClock(Some(at(10, 5, 0, 0))),
            Arc::new(EventLog::new()),
        );
        assert!(executor.run_pending(&runs));
    }
    assert!(!interlock.is_busy());

    // Hold and settle for each of the three valves, all while held.
    assert_eq!(watch.busy_seen, vec![true; 6]);
    assert!(interlock.try_start(request([1, 0, 0, 0])).is_ok());
}

/// Delay that, on every wait, tries to start a competing run through a
/// shared handle the way an API caller would.
struct ContendingDelay {
    shared: Arc<ActuationInterlock>,
    admitted: Vec<bool>,
}

impl DelayNs for ContendingDelay {
    fn delay_ns(&mut self, _ns: u32) {
        self.contend();
    }

    fn delay_ms(&mut self, _ms: u32) {
        self.contend();
    }
}

impl ContendingDelay {
    fn contend(&mut self) {
        let result = self.shared.try_start(request([1, 1, 1, 1]));
        if let Err(e) = result {
            assert_eq!(e, Error::Busy);
        }
        self.admitted.push(result.is_ok());
    }
}

#[test]
fn shared_handles_cannot_end_a_run_early() {
    let (interlock, runs) = ActuationInterlock::new();
    let mut contender = ContendingDelay {
        shared: Arc::clone(&interlock),
        admitted: Vec::new(),
    };
    interlock.try_start(request([20, 20, 0, 0])).unwrap();

    let mut executor = WateringExecutor::new(
        MockActuators::new(),
        &mut contender,
        FixedClock(None),
        Arc::new(EventLog::new()),
    );
    assert!(executor.run_pending(&runs));
    assert!(!executor.run_pending(&runs), "no competing run was queued");
    drop(executor);

    assert_eq!(contender.admitted, vec![false; 4]);
    assert!(!interlock.is_busy());
    assert!(interlock.try_start(request([1, 0, 0, 0])).is_ok());
}

#[test]
fn rejected_request_leaves_running_request_untouched() {
    let (interlock, runs) = ActuationInterlock::new();
    interlock.try_start(request([30, 0, 45, 0])).unwrap();
    assert_eq!(interlock.try_start(request([60, 60, 60, 60])), Err(Error::Busy));

    let mut executor = WateringExecutor::new(
        MockActuators::new(),
        CountingDelay::default(),
        FixedClock(None),
        Arc::new(EventLog::new()),
    );
    assert!(executor.run_pending(&runs));
    assert_eq!(executor.actuators().opened_valves(), vec![0, 2]);
    assert!(!executor.run_pending(&runs));
}

#[test]
fn run_pending_without_request_is_noop() {
    let (_interlock, runs) = ActuationInterlock::new();
    let mut executor = WateringExecutor::new(
        MockActuators::new(),
        CountingDelay::default(),
        FixedClock(None),
        Arc::new(EventLog::new()),
    );
    let boot_calls = executor.actuators().calls.len();
    assert!(!executor.run_pending(&runs));
    assert_eq!(executor.actuators().calls.len(), boot_calls);
}

// ── Executor sequencing ───────────────────────────────────────

#[test]
fn executor_boots_with_everything_off() {
    let executor = WateringExecutor::new(
        MockActuators::new(),
        CountingDelay::default(),
        FixedClock(None),
        Arc::new(EventLog::new()),
    );
    let calls = &executor.actuators().calls;
    assert_eq!(calls[0], ActuatorCall::Pump(false));
    assert!(calls[1..]
        .iter()
        .all(|c| matches!(c, ActuatorCall::Valve { open: false, .. })));
    assert_eq!(calls.len(), 5);
}

#[test]
fn execute_holds_and_settles_per_valve() {
    let now = at(10, 5, 0, 0);
    let log = Arc::new(EventLog::new());
    let mut executor = WateringExecutor::new(
        MockActuators::new(),
        CountingDelay::default(),
        FixedClock(Some(now)),
        Arc::clone(&log),
    );
    let boot = executor.actuators().calls.len();

    let ran = executor.execute(&request([30, 0, 45, 0]));
    assert_eq!(ran, 2);

    assert_eq!(
        executor.actuators().calls[boot..],
        [
            ActuatorCall::Valve { index: 0, open: true },
            ActuatorCall::Pump(true),
            ActuatorCall::Pump(false),
            ActuatorCall::Valve { index: 0, open: false },
            ActuatorCall::Valve { index: 2, open: true },
            ActuatorCall::Pump(true),
            ActuatorCall::Pump(false),
            ActuatorCall::Valve { index: 2, open: false },
        ]
    );
    assert_eq!(log.snapshot(), vec![
        Event::watering(now.epoch_secs, 0, 30),
        Event::watering(now.epoch_secs, 2, 45),
    ]);
}

#[test]
fn execute_waits_duration_plus_buffer_then_settles() {
    let mut delay_log = CountingDelay::default();
    {
        let mut executor = WateringExecutor::new(
            MockActuators::new(),
            &mut delay_log,
            FixedClock(None),
            Arc::new(EventLog::new()),
        );
        executor.execute(&request([30, 0, 45, 0]));
    }
    let hold = |secs: u32| (secs + SAFETY_BUFFER_SECS) * 1_000;
    let settle = INTER_VALVE_SETTLE_SECS * 1_000;
    assert_eq!(delay_log.waits_ms, vec![hold(30), settle, hold(45), settle]);
}

#[test]
fn unsynced_clock_stamps_zero() {
    let log = Arc::new(EventLog::new());
    let mut executor = WateringExecutor::new(
        MockActuators::new(),
        CountingDelay::default(),
        FixedClock(None),
        Arc::clone(&log),
    );
    executor.execute(&request([0, 0, 0, 12]));
    assert_eq!(log.snapshot(), vec![Event::watering(0, 3, 12)]);
}

// ── Manual request validation ─────────────────────────────────

#[test]
fn from_pairs_validates_boundaries() {
    let ok = ActuationRequest::from_pairs(&[(0, 600), (1, -5), (3, 0)]).unwrap();
    assert_eq!(ok.active_valves(), 1);
    assert_eq!(ok.runs()[1].duration_secs, 0);

    assert_eq!(
        ActuationRequest::from_pairs(&[(4, 10)]),
        Err(Error::OutOfRange(OutOfRange::Valve(4)))
    );
    assert_eq!(
        ActuationRequest::from_pairs(&[(0, 601)]),
        Err(Error::OutOfRange(OutOfRange::Duration(601)))
    );
    let too_many = [(0usize, 1i32); 9];
    assert_eq!(
        ActuationRequest::from_pairs(&too_many),
        Err(Error::OutOfRange(OutOfRange::RunCount(9)))
    );
}

// ── Worker task hand-off ──────────────────────────────────────

#[test]
fn worker_task_executes_and_releases() {
    let (interlock, runs) = ActuationInterlock::new();
    let log = Arc::new(EventLog::new());
    let executor = WateringExecutor::new(
        MockActuators::new(),
        CountingDelay::default(),
        FixedClock(Some(at(10, 11, 0, 0))),
        Arc::clone(&log),
    );
    let _worker = spawn_watering_worker(executor, runs).unwrap();

    interlock.try_start(request([10, 20, 0, 0])).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while interlock.is_busy() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(!interlock.is_busy(), "worker should finish the run");
    assert_eq!(log.event_count(), 2);

    // The slot is free again for the next run.
    interlock.try_start(request([5, 0, 0, 0])).unwrap();
}
