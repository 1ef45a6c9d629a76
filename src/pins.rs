//! GPIO / peripheral pin assignments for the garden controller board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// 5 V relay bank (active LOW)
// ---------------------------------------------------------------------------

/// Relays 0-3 switch the soil sensor supplies, relay 7 the pump.
/// Relays 4-6 are unused.
pub const RELAY_5V_GPIO: [i32; 8] = [18, 17, 16, 15, 7, 6, 5, 4];

/// Sensor supply relays, one per soil sensor channel.
pub const SENSOR_POWER_GPIO: [i32; 4] = [
    RELAY_5V_GPIO[0],
    RELAY_5V_GPIO[1],
    RELAY_5V_GPIO[2],
    RELAY_5V_GPIO[3],
];

/// Shared water pump relay.
pub const PUMP_GPIO: i32 = RELAY_5V_GPIO[7];

/// Level that energises a 5 V relay.
pub const RELAY_5V_ACTIVE_HIGH: bool = false;

// ---------------------------------------------------------------------------
// 12 V valve relays (active HIGH)
// ---------------------------------------------------------------------------

/// Solenoid valve relays, one per watering zone.
pub const VALVE_GPIO: [i32; 4] = [47, 21, 20, 19];

/// Level that opens a valve.
pub const VALVE_ACTIVE_HIGH: bool = true;

// ---------------------------------------------------------------------------
// Soil moisture sensors: Analog
// ---------------------------------------------------------------------------

/// One ADC input: GPIO number plus the oneshot unit/channel behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcInput {
    pub gpio: i32,
    /// ADC unit (1 or 2).
    pub unit: u8,
    pub channel: u32,
}

/// Capacitive soil sensors, 12-bit, 12 dB attenuation.
/// GPIO 11 sits on ADC2 on the ESP32-S3; the rest are ADC1.
pub const SOIL_ADC: [AdcInput; 4] = [
    AdcInput { gpio: 10, unit: 1, channel: 9 },
    AdcInput { gpio: 9, unit: 1, channel: 8 },
    AdcInput { gpio: 11, unit: 2, channel: 0 },
    AdcInput { gpio: 3, unit: 1, channel: 2 },
];

/// Full-scale raw reading.
pub const ADC_MAX: u16 = 4095;
