//! One-shot hardware peripheral initialization.
//!
//! Configures the soil ADC channels and the relay GPIO outputs using raw
//! ESP-IDF sys calls.  Called once from `main()` before any task starts.
//! Every output is driven to its inactive level before it becomes an
//! output, so relays never glitch on at boot.
//!
//! On host targets the GPIO levels and ADC readings live in atomics that
//! tests and the simulator can inspect and inject.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use crate::pins;
#[cfg(target_os = "espidf")]
use crate::pins::AdcInput;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
        }
    }
}

impl std::error::Error for HwInitError {}

/// Every relay output with its inactive (off) level.
pub fn relay_outputs() -> impl Iterator<Item = (i32, bool)> {
    let relays = pins::RELAY_5V_GPIO
        .into_iter()
        .map(|pin| (pin, !pins::RELAY_5V_ACTIVE_HIGH));
    let valves = pins::VALVE_GPIO
        .into_iter()
        .map(|pin| (pin, !pins::VALVE_ACTIVE_HIGH));
    relays.chain(valves)
}

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before any task is spawned.
    unsafe {
        init_gpio_outputs()?;
        init_adc()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    for (pin, idle) in relay_outputs() {
        gpio_write(pin, idle);
    }
    log::info!("hw_init(sim): relay outputs idle, ADC simulated");
    Ok(())
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC_HANDLES: [adc_oneshot_unit_handle_t; 2] = [core::ptr::null_mut(); 2];

/// SAFETY: handles are written once in `init_adc()` before any reader
/// exists; afterwards they are only read.
#[cfg(target_os = "espidf")]
unsafe fn adc_handle(unit: u8) -> adc_oneshot_unit_handle_t {
    unsafe { ADC_HANDLES[usize::from(unit.saturating_sub(1)).min(1)] }
}

#[cfg(target_os = "espidf")]
unsafe fn init_adc() -> Result<(), HwInitError> {
    for (slot, unit_id) in [adc_unit_t_ADC_UNIT_1, adc_unit_t_ADC_UNIT_2].into_iter().enumerate() {
        let init_cfg = adc_oneshot_unit_init_cfg_t {
            unit_id,
            ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
            ..Default::default()
        };
        // SAFETY: ADC_HANDLES is only written here, once at boot.
        let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC_HANDLES[slot]) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::AdcInitFailed(ret));
        }
    }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    for input in pins::SOIL_ADC {
        let ret = unsafe { adc_oneshot_config_channel(adc_handle(input.unit), input.channel, &chan_cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::AdcInitFailed(ret));
        }
    }

    info!("hw_init: soil ADC configured ({} channels)", pins::SOIL_ADC.len());
    Ok(())
}

/// One raw conversion.  A failed read returns 0.
#[cfg(target_os = "espidf")]
pub fn adc_read(input: AdcInput) -> u16 {
    let mut raw: i32 = 0;
    // SAFETY: adc_handle() contract; the oneshot driver serialises access
    // to each unit internally.
    let ret = unsafe { adc_oneshot_read(adc_handle(input.unit), input.channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return 0;
    }
    raw.clamp(0, i32::from(pins::ADC_MAX)) as u16
}

#[cfg(not(target_os = "espidf"))]
mod sim {
    use core::sync::atomic::{AtomicU16, AtomicU64, Ordering};

    use crate::pins::{self, AdcInput};

    static SIM_ADC: [AtomicU16; 4] = [const { AtomicU16::new(2048) }; 4];
    static SIM_GPIO_LEVELS: AtomicU64 = AtomicU64::new(0);

    fn adc_slot(gpio: i32) -> Option<usize> {
        pins::SOIL_ADC.iter().position(|a| a.gpio == gpio)
    }

    /// Inject the raw value returned for a soil ADC GPIO.
    pub fn sim_set_adc(gpio: i32, raw: u16) {
        if let Some(slot) = adc_slot(gpio) {
            SIM_ADC[slot].store(raw.min(pins::ADC_MAX), Ordering::Relaxed);
        }
    }

    pub fn adc_read(input: AdcInput) -> u16 {
        adc_slot(input.gpio).map_or(0, |slot| SIM_ADC[slot].load(Ordering::Relaxed))
    }

    pub fn gpio_write(pin: i32, high: bool) {
        let bit = 1u64 << (pin as u32 & 63);
        if high {
            SIM_GPIO_LEVELS.fetch_or(bit, Ordering::Relaxed);
        } else {
            SIM_GPIO_LEVELS.fetch_and(!bit, Ordering::Relaxed);
        }
    }

    /// Last level written to `pin`.
    pub fn sim_gpio_level(pin: i32) -> bool {
        SIM_GPIO_LEVELS.load(Ordering::Relaxed) & (1u64 << (pin as u32 & 63)) != 0
    }
}

#[cfg(not(target_os = "espidf"))]
pub use sim::{adc_read, gpio_write, sim_gpio_level, sim_set_adc};

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    for (pin, idle) in relay_outputs() {
        // Latch the idle level before enabling the output driver.
        unsafe { gpio_set_level(pin, u32::from(idle)) };
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        unsafe { gpio_set_level(pin, u32::from(idle)) };
    }

    info!("hw_init: relay outputs configured (all idle)");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to an output configured in
    // init_gpio_outputs(); the register write is atomic per pin.
    unsafe {
        gpio_set_level(pin, if high { 1 } else { 0 });
    }
}
