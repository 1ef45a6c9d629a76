//! Soil sensor sampling.
//!
//! Each channel is powered only while it is read: power on, wait the
//! configured settle time, average a short burst of ADC conversions, power
//! off.  The sequence has no state of its own; the running statistics shown
//! on the status report live in [`SoilReadings`].
//!
//! The sensors belong to the scheduler task.  Anyone else wanting a reading
//! now files it through [`SampleRequests`]; the scheduler takes the request
//! on its next tick and sends the result back.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embedded_hal::delay::DelayNs;
use log::debug;
use serde::Serialize;

use crate::app::ports::SensorPort;
use crate::config::SENSOR_COUNT;

/// ADC conversions averaged per channel.
pub const SAMPLES_PER_CHANNEL: u32 = 5;
/// Spacing between conversions within one burst.
pub const SAMPLE_SPACING_MS: u32 = 50;

/// Averaged reading (0–4095) per sensor channel.
pub type SoilSample = [u16; SENSOR_COUNT];

/// Anything that can produce one full soil sample.
pub trait SoilProbe {
    fn sample_all(&mut self, settle_ms: u32) -> SoilSample;
}

// ═══════════════════════════════════════════════════════════════
//  Sensor bank
// ═══════════════════════════════════════════════════════════════

/// Drives the power-settle-average sequence over a [`SensorPort`].
pub struct SensorBank<S, D> {
    sensors: S,
    delay: D,
}

impl<S: SensorPort, D: DelayNs> SensorBank<S, D> {
    /// Takes ownership of the sensors and powers every channel down.
    pub fn new(mut sensors: S, delay: D) -> Self {
        for ch in 0..SENSOR_COUNT {
            sensors.set_sensor_power(ch, false);
        }
        Self { sensors, delay }
    }

    /// Power, settle and average one channel.
    pub fn read_averaged(&mut self, channel: usize, settle_ms: u32) -> u16 {
        self.sensors.set_sensor_power(channel, true);
        self.delay.delay_ms(settle_ms);

        let mut sum: u32 = 0;
        for _ in 0..SAMPLES_PER_CHANNEL {
            sum += u32::from(self.sensors.read_channel(channel));
            self.delay.delay_ms(SAMPLE_SPACING_MS);
        }

        self.sensors.set_sensor_power(channel, false);
        let avg = (sum / SAMPLES_PER_CHANNEL) as u16;
        debug!("Soil: channel {} = {}", channel, avg);
        avg
    }

    pub fn sensors(&self) -> &S {
        &self.sensors
    }

    pub fn delay(&self) -> &D {
        &self.delay
    }
}

impl<S: SensorPort, D: DelayNs> SoilProbe for SensorBank<S, D> {
    fn sample_all(&mut self, settle_ms: u32) -> SoilSample {
        let mut sample = [0; SENSOR_COUNT];
        for (ch, slot) in sample.iter_mut().enumerate() {
            *slot = self.read_averaged(ch, settle_ms);
        }
        sample
    }
}

// ═══════════════════════════════════════════════════════════════
//  Running statistics
// ═══════════════════════════════════════════════════════════════

/// Last/min/max per channel since the last rollover.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SoilStats {
    pub last: SoilSample,
    pub min: SoilSample,
    pub max: SoilSample,
    /// Samples folded in since the last reset.
    pub samples: u32,
    /// Epoch seconds of the latest sample.
    pub last_sample_at: Option<i64>,
}

impl SoilStats {
    fn fold(&mut self, sample: &SoilSample, timestamp: i64) {
        if self.samples == 0 {
            self.min = *sample;
            self.max = *sample;
        } else {
            for ch in 0..SENSOR_COUNT {
                self.min[ch] = self.min[ch].min(sample[ch]);
                self.max[ch] = self.max[ch].max(sample[ch]);
            }
        }
        self.last = *sample;
        self.samples = self.samples.saturating_add(1);
        self.last_sample_at = Some(timestamp);
    }
}

/// Shared [`SoilStats`], written by the scheduler, read by the API layer.
pub struct SoilReadings {
    stats: Mutex<CriticalSectionRawMutex, RefCell<SoilStats>>,
}

impl SoilReadings {
    pub const fn new() -> Self {
        Self {
            stats: Mutex::new(RefCell::new(SoilStats {
                last: [0; SENSOR_COUNT],
                min: [0; SENSOR_COUNT],
                max: [0; SENSOR_COUNT],
                samples: 0,
                last_sample_at: None,
            })),
        }
    }

    pub fn update(&self, sample: &SoilSample, timestamp: i64) {
        self.stats.lock(|s| s.borrow_mut().fold(sample, timestamp));
    }

    /// Overwrite only the latest reading, leaving the day's extremes and
    /// sample count alone.
    pub fn set_last(&self, sample: &SoilSample, timestamp: Option<i64>) {
        self.stats.lock(|s| {
            let mut s = s.borrow_mut();
            s.last = *sample;
            if timestamp.is_some() {
                s.last_sample_at = timestamp;
            }
        });
    }

    pub fn snapshot(&self) -> SoilStats {
        self.stats.lock(|s| *s.borrow())
    }

    pub fn reset(&self) {
        self.stats.lock(|s| *s.borrow_mut() = SoilStats::default());
    }
}

impl Default for SoilReadings {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════
//  On-demand reads
// ═══════════════════════════════════════════════════════════════

/// One-slot mailbox for reads outside the sampling cadence.
///
/// Requests coalesce: asking while one is already queued adds nothing.
/// The result comes back on a second one-slot channel holding only the
/// newest sample, so it reaches a single waiter.
pub struct SampleRequests {
    pending: Channel<CriticalSectionRawMutex, (), 1>,
    done: Channel<CriticalSectionRawMutex, SoilSample, 1>,
}

impl SampleRequests {
    pub const fn new() -> Self {
        Self {
            pending: Channel::new(),
            done: Channel::new(),
        }
    }

    /// Queue a read.  Returns `false` if one was already waiting.
    pub fn request(&self) -> bool {
        let _ = self.done.try_receive();
        self.pending.try_send(()).is_ok()
    }

    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Resolves with the sample taken for the latest request.
    pub async fn wait(&self) -> SoilSample {
        self.done.receive().await
    }

    pub(crate) fn take(&self) -> bool {
        self.pending.try_receive().is_ok()
    }

    pub(crate) fn complete(&self, sample: SoilSample) {
        let _ = self.done.try_receive();
        let _ = self.done.try_send(sample);
    }
}

impl Default for SampleRequests {
    fn default() -> Self {
        Self::new()
    }
}
