//! Integration tests for the daily cycle: scheduler ticks against the
//! shared log, interlock and statistics, then execution of whatever the
//! scheduler accepted.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;

use garden::app::events::AppEvent;
use garden::app::service::GardenService;
use garden::clock::WallTime;
use garden::config::{ConfigCell, GardenConfig, ScheduleEntry, TimeOfDay};
use garden::event_log::Event;
use garden::interlock::{RunReceiver, WateringExecutor};
use garden::runtime::SchedulerLoop;
use garden::sampling::{SensorBank, SAMPLES_PER_CHANNEL, SAMPLE_SPACING_MS};
use garden::scheduler::WateringMatch;

use crate::mock_hw::{
    at, CountingDelay, FixedClock, FixedProbe, MockActuators, MockArchive, MockSensors,
    RecordingSink,
};

const SAMPLE: [u16; 4] = [1200, 1800, 2400, 3000];

fn hhmm(hour: u8, minute: u8) -> TimeOfDay {
    TimeOfDay::new(hour, minute).expect("valid time")
}

/// lightStart=23, lightEnd=17, sampling every `interval` minutes, with the
/// given schedules.
fn config(interval: u8, schedules: &[ScheduleEntry]) -> GardenConfig {
    let mut cfg = GardenConfig {
        soil_log_interval_min: interval,
        ..GardenConfig::default()
    };
    cfg.schedules.clear();
    for entry in schedules {
        cfg.schedules.push(*entry).expect("schedule capacity");
    }
    cfg
}

struct Harness {
    service: GardenService,
    runs: RunReceiver,
    probe: FixedProbe,
    archive: MockArchive,
    sink: RecordingSink,
}

impl Harness {
    fn new(cfg: GardenConfig) -> (Self, garden::scheduler::Scheduler) {
        let (service, runs) = GardenService::new(cfg);
        let scheduler = service.scheduler();
        (
            Self {
                service,
                runs,
                probe: FixedProbe::new(SAMPLE),
                archive: MockArchive::default(),
                sink: RecordingSink::default(),
            },
            scheduler,
        )
    }

    fn executor(&self, now: WallTime) -> WateringExecutor<MockActuators, CountingDelay, FixedClock> {
        WateringExecutor::new(
            MockActuators::new(),
            CountingDelay::default(),
            FixedClock(Some(now)),
            Arc::clone(self.service.event_log()),
        )
    }
}

type TestLoop = SchedulerLoop<Arc<ConfigCell>, FixedClock, FixedProbe, MockArchive, RecordingSink>;

fn scheduler_loop(service: &GardenService, clock: FixedClock) -> TestLoop {
    SchedulerLoop {
        scheduler: service.scheduler(),
        config: Arc::clone(service.config_cell()),
        clock,
        probe: FixedProbe::new(SAMPLE),
        archive: MockArchive::default(),
        sink: RecordingSink::default(),
    }
}

// ── Soil sampling ─────────────────────────────────────────────

#[test]
fn samples_once_per_interval_minute_inside_window() {
    let (mut h, mut sched) = Harness::new(config(15, &[]));
    let cfg = h.service.config();

    let first = sched.tick(&at(10, 22, 15, 0), &cfg, &mut h.probe, &mut h.archive, &mut h.sink);
    assert!(first.sampled, "22:15 is inside a 22→17 window");

    let again = sched.tick(&at(10, 22, 15, 30), &cfg, &mut h.probe, &mut h.archive, &mut h.sink);
    assert!(!again.sampled, "same minute must not sample twice");

    let next = sched.tick(&at(10, 22, 30, 0), &cfg, &mut h.probe, &mut h.archive, &mut h.sink);
    assert!(next.sampled);

    assert_eq!(h.probe.calls, 2);
    assert_eq!(h.service.event_count(), 8, "four readings per sample");

    let t = at(10, 22, 30, 0).epoch_secs;
    for sensor in 0..4u8 {
        assert_eq!(
            h.service.event_at(4 + usize::from(sensor)).unwrap(),
            Event::sensor_reading(t, sensor, SAMPLE[usize::from(sensor)])
        );
    }
}

#[test]
fn no_sampling_outside_window_or_off_interval() {
    let (mut h, mut sched) = Harness::new(config(15, &[]));
    let cfg = h.service.config();

    // 17:00 is the first hour past the window.
    let outside = sched.tick(&at(10, 17, 0, 0), &cfg, &mut h.probe, &mut h.archive, &mut h.sink);
    assert!(!outside.sampled);
    let off_interval = sched.tick(&at(10, 10, 7, 0), &cfg, &mut h.probe, &mut h.archive, &mut h.sink);
    assert!(!off_interval.sampled);

    assert_eq!(h.probe.calls, 0);
    assert_eq!(h.service.event_count(), 0);
}

#[test]
fn zero_interval_disables_sampling() {
    let (mut h, mut sched) = Harness::new(config(0, &[]));
    let cfg = h.service.config();
    let outcome = sched.tick(&at(10, 23, 0, 0), &cfg, &mut h.probe, &mut h.archive, &mut h.sink);
    assert!(!outcome.sampled);
    assert_eq!(h.probe.calls, 0);
}

#[test]
fn sampling_feeds_status_statistics() {
    let (mut h, mut sched) = Harness::new(config(15, &[]));
    let cfg = h.service.config();
    let now = at(10, 6, 45, 0);

    sched.tick(&now, &cfg, &mut h.probe, &mut h.archive, &mut h.sink);

    let status = h.service.status(0);
    assert_eq!(status.soil_humidity_last, SAMPLE);
    assert_eq!(status.soil_humidity_min, SAMPLE);
    assert_eq!(status.soil_humidity_max, SAMPLE);
    assert_eq!(status.last_reading_timestamp, Some(now.epoch_secs));
    assert!(h.sink.events.contains(&AppEvent::SoilSampled(SAMPLE)));
}

#[test]
fn sensor_bank_powers_each_channel_only_while_read() {
    let (mut h, mut sched) = Harness::new(config(15, &[]));
    let cfg = h.service.config();
    let mut bank = SensorBank::new(MockSensors::new(SAMPLE), CountingDelay::default());

    let outcome = sched.tick(&at(10, 22, 15, 0), &cfg, &mut bank, &mut h.archive, &mut h.sink);
    assert!(outcome.sampled);
    assert_eq!(h.service.status(0).soil_humidity_last, SAMPLE);

    let power = &bank.sensors().power;
    assert!(power[..4].iter().all(|&(_, on)| !on), "bank starts powered down");
    let per_read: Vec<(usize, bool)> = (0..4).flat_map(|ch| [(ch, true), (ch, false)]).collect();
    assert_eq!(&power[4..], per_read.as_slice());

    let settle = cfg.sensor_settle_ms;
    let mut expected_waits = Vec::new();
    for _ in 0..4 {
        expected_waits.push(settle);
        expected_waits.extend(std::iter::repeat_n(SAMPLE_SPACING_MS, SAMPLES_PER_CHANNEL as usize));
    }
    assert_eq!(bank.delay().waits_ms, expected_waits);
}

// ── Daily rollover ────────────────────────────────────────────

#[test]
fn rollover_clears_once_per_day_at_window_open() {
    let (mut h, mut sched) = Harness::new(config(0, &[]));
    let cfg = h.service.config();
    let log = Arc::clone(h.service.event_log());

    log.record(Event::watering(1, 0, 30));
    log.record(Event::watering(2, 1, 30));

    let d = at(10, 22, 0, 5);
    let outcome = sched.tick(&d, &cfg, &mut h.probe, &mut h.archive, &mut h.sink);
    assert!(outcome.rolled_over);
    assert_eq!(log.event_count(), 0);
    assert_eq!(
        sched.state().last_rollover_day,
        NaiveDate::from_ymd_opt(2024, 6, 10)
    );
    assert_eq!(h.archive.batches.len(), 1);
    assert_eq!(h.archive.batches[0].len(), 2);

    // Same day, still inside the grace window: no second clear.
    log.record(Event::watering(3, 2, 30));
    let later = sched.tick(&at(10, 22, 0, 7), &cfg, &mut h.probe, &mut h.archive, &mut h.sink);
    assert!(!later.rolled_over);
    assert_eq!(log.event_count(), 1);

    // Next day clears again.
    let next_day = sched.tick(&at(11, 22, 0, 3), &cfg, &mut h.probe, &mut h.archive, &mut h.sink);
    assert!(next_day.rolled_over);
    assert_eq!(log.event_count(), 0);
    assert_eq!(
        sched.state().last_rollover_day,
        NaiveDate::from_ymd_opt(2024, 6, 11)
    );
    assert_eq!(h.archive.batches.len(), 2);
}

#[test]
fn rollover_only_within_grace_seconds() {
    let (mut h, mut sched) = Harness::new(config(0, &[]));
    let cfg = h.service.config();
    h.service.event_log().record(Event::watering(1, 0, 30));

    let late = sched.tick(&at(10, 22, 0, 15), &cfg, &mut h.probe, &mut h.archive, &mut h.sink);
    assert!(!late.rolled_over);
    let wrong_hour = sched.tick(&at(10, 23, 0, 0), &cfg, &mut h.probe, &mut h.archive, &mut h.sink);
    assert!(!wrong_hour.rolled_over);
    assert_eq!(h.service.event_count(), 1);
}

#[test]
fn failed_archive_still_clears_and_reports() {
    let (mut h, mut sched) = Harness::new(config(0, &[]));
    let cfg = h.service.config();
    h.archive.fail = true;
    h.service.event_log().record(Event::watering(1, 0, 30));

    let outcome = sched.tick(&at(10, 22, 0, 0), &cfg, &mut h.probe, &mut h.archive, &mut h.sink);
    assert!(outcome.rolled_over);
    assert_eq!(h.service.event_count(), 0);
    assert!(h.sink.events.contains(&AppEvent::LogRolledOver {
        archived: 1,
        archive_ok: false,
    }));
}

#[test]
fn empty_log_rolls_over_without_archiving() {
    let (mut h, mut sched) = Harness::new(config(0, &[]));
    let cfg = h.service.config();

    let outcome = sched.tick(&at(10, 22, 0, 0), &cfg, &mut h.probe, &mut h.archive, &mut h.sink);
    assert!(outcome.rolled_over);
    assert!(h.archive.batches.is_empty());
}

#[test]
fn rollover_resets_statistics() {
    let (mut h, mut sched) = Harness::new(config(15, &[]));
    let cfg = h.service.config();

    sched.tick(&at(10, 16, 45, 0), &cfg, &mut h.probe, &mut h.archive, &mut h.sink);
    assert!(h.service.status(0).last_reading_timestamp.is_some());

    // Window opens at 22:00; the rollover resets before that minute's sample.
    let open = at(10, 22, 0, 1);
    sched.tick(&open, &cfg, &mut h.probe, &mut h.archive, &mut h.sink);
    let status = h.service.status(0);
    assert_eq!(status.last_reading_timestamp, Some(open.epoch_secs));
    assert_eq!(status.event_count, 4, "only the post-rollover sample remains");
}

// ── Watering schedule match ───────────────────────────────────

#[test]
fn schedule_match_runs_only_active_valves() {
    let entry = ScheduleEntry {
        time: hhmm(5, 0),
        durations: [30, 0, 45, 0],
    };
    let (mut h, mut sched) = Harness::new(config(0, &[entry]));
    let cfg = h.service.config();
    let now = at(10, 5, 0, 0);

    let outcome = sched.tick(&now, &cfg, &mut h.probe, &mut h.archive, &mut h.sink);
    assert_eq!(outcome.watering, Some(WateringMatch::Started(hhmm(5, 0))));
    assert!(h.service.is_busy());
    assert!(h.sink.events.contains(&AppEvent::WateringStarted {
        schedule: Some(hhmm(5, 0)),
        valves: 2,
    }));

    let mut executor = h.executor(now);
    assert!(executor.run_pending(&h.runs));
    assert!(!h.service.is_busy());

    assert_eq!(executor.actuators().opened_valves(), vec![0, 2]);
    assert!(!executor.actuators().pump_on());
    assert_eq!(h.service.event_count(), 2);
    assert_eq!(h.service.event_at(0).unwrap(), Event::watering(now.epoch_secs, 0, 30));
    assert_eq!(h.service.event_at(1).unwrap(), Event::watering(now.epoch_secs, 2, 45));
}

#[test]
fn schedule_fires_once_per_minute_and_again_next_day() {
    let entry = ScheduleEntry {
        time: hhmm(11, 0),
        durations: [10, 10, 10, 10],
    };
    let (mut h, mut sched) = Harness::new(config(0, &[entry]));
    let cfg = h.service.config();
    let mut executor = h.executor(at(10, 11, 0, 0));

    let first = sched.tick(&at(10, 11, 0, 0), &cfg, &mut h.probe, &mut h.archive, &mut h.sink);
    assert_eq!(first.watering, Some(WateringMatch::Started(hhmm(11, 0))));
    assert!(executor.run_pending(&h.runs));

    let same_minute = sched.tick(&at(10, 11, 0, 40), &cfg, &mut h.probe, &mut h.archive, &mut h.sink);
    assert_eq!(same_minute.watering, None);
    assert!(!h.service.is_busy());
    assert!(!executor.run_pending(&h.runs));

    let next_day = sched.tick(&at(11, 11, 0, 1), &cfg, &mut h.probe, &mut h.archive, &mut h.sink);
    assert_eq!(next_day.watering, Some(WateringMatch::Started(hhmm(11, 0))));
}

#[test]
fn busy_interlock_drops_match_without_queueing() {
    let early = ScheduleEntry {
        time: hhmm(5, 0),
        durations: [30, 30, 30, 30],
    };
    let late = ScheduleEntry {
        time: hhmm(5, 1),
        durations: [60, 0, 0, 0],
    };
    let (mut h, mut sched) = Harness::new(config(0, &[early, late]));
    let cfg = h.service.config();

    sched.tick(&at(10, 5, 0, 0), &cfg, &mut h.probe, &mut h.archive, &mut h.sink);
    let dropped = sched.tick(&at(10, 5, 1, 0), &cfg, &mut h.probe, &mut h.archive, &mut h.sink);

    assert_eq!(dropped.watering, Some(WateringMatch::Busy(hhmm(5, 1))));
    assert!(h.sink.events.contains(&AppEvent::WateringSkipped {
        schedule: hhmm(5, 1),
    }));

    let mut executor = h.executor(at(10, 5, 0, 0));
    assert!(executor.run_pending(&h.runs));
    assert_eq!(executor.actuators().opened_valves(), vec![0, 1, 2, 3]);
    assert!(!executor.run_pending(&h.runs), "dropped run never queued");
    assert!(!h.service.is_busy());
}

// ── Scheduler loop ────────────────────────────────────────────

#[test]
fn loop_skips_ticks_while_clock_unsynced() {
    let (service, _runs) = GardenService::new(config(15, &[]));
    let mut task = scheduler_loop(&service, FixedClock(None));
    assert!(task.run_once().is_none());
    assert_eq!(task.probe.calls, 0);

    task.clock = FixedClock(Some(at(10, 22, 15, 0)));
    let outcome = task.run_once().expect("synced clock ticks");
    assert!(outcome.sampled);
    assert_eq!(service.event_count(), 4);
}

#[test]
fn loop_picks_up_config_changes_between_ticks() {
    let (service, _runs) = GardenService::new(config(15, &[]));
    let mut task = scheduler_loop(&service, FixedClock(Some(at(10, 12, 10, 0))));
    assert!(!task.run_once().expect("synced").sampled);

    let faster = GardenConfig {
        soil_log_interval_min: 5,
        ..(*service.config()).clone()
    };
    service.config_cell().replace(faster).unwrap();

    assert!(task.run_once().expect("synced").sampled);
}

// ── On-demand reads ───────────────────────────────────────────

#[test]
fn read_request_served_outside_window_without_logging() {
    let (service, _runs) = GardenService::new(config(15, &[]));
    let now = at(10, 17, 30, 0);
    let mut task = scheduler_loop(&service, FixedClock(Some(now)));

    assert!(service.request_sample());
    assert!(!service.request_sample(), "second request coalesces");
    let outcome = task.run_once().expect("synced");
    assert!(!outcome.sampled, "17:30 is outside the window");
    assert_eq!(task.probe.calls, 1);

    let status = service.status(0);
    assert_eq!(status.soil_humidity_last, SAMPLE);
    assert_eq!(status.soil_humidity_max, [0; 4], "extremes only follow logged samples");
    assert_eq!(status.last_reading_timestamp, Some(now.epoch_secs));
    assert_eq!(service.event_count(), 0);

    task.run_once();
    assert_eq!(task.probe.calls, 1, "request is served once");
}

#[test]
fn read_request_served_while_clock_unsynced() {
    let (service, _runs) = GardenService::new(config(15, &[]));
    let mut task = scheduler_loop(&service, FixedClock(None));

    service.request_sample();
    assert!(task.run_once().is_none());
    assert_eq!(task.probe.calls, 1);

    let status = service.status(0);
    assert_eq!(status.soil_humidity_last, SAMPLE);
    assert_eq!(status.last_reading_timestamp, None);
}

#[test]
fn read_sensors_completes_on_next_tick() {
    let (service, _runs) = GardenService::new(config(15, &[]));
    let mut task = scheduler_loop(&service, FixedClock(Some(at(10, 12, 7, 0))));

    let reader = {
        let service = service.clone();
        thread::spawn(move || futures_lite::future::block_on(service.read_sensors()))
    };
    for _ in 0..1_000 {
        if reader.is_finished() {
            break;
        }
        task.run_once();
        thread::sleep(Duration::from_millis(2));
    }

    let report = reader.join().expect("reader thread");
    assert_eq!(report.soil_readings_last, SAMPLE);
    assert_eq!(service.status(0).soil_humidity_last, SAMPLE);
    assert_eq!(service.event_count(), 0);
}
