//! Hardware adapter: bridges the relay board to the domain port traits.
//!
//! The board is split into two owners so each worker task holds exactly the
//! outputs it drives: [`SoilSensorBoard`] (sensor supply relays + soil ADC)
//! goes to the scheduler, [`WateringRelays`] (valves + pump) to the watering
//! executor.  Both drive their outputs off on construction.
//!
//! Relay polarity comes from [`pins`](crate::pins).  On non-espidf
//! targets the underlying GPIO/ADC calls hit the simulation atomics in
//! [`hw_init`](crate::drivers::hw_init).

use log::debug;

use crate::app::ports::{ActuatorPort, SensorPort};
use crate::config::{SENSOR_COUNT, VALVE_COUNT};
use crate::drivers::hw_init::{adc_read, gpio_write};
use crate::pins;

/// Entry point: hands out the two halves of the relay board.
pub struct RelayBoard;

impl RelayBoard {
    pub fn split() -> (SoilSensorBoard, WateringRelays) {
        (SoilSensorBoard::new(), WateringRelays::new())
    }
}

// ── Soil sensors ──────────────────────────────────────────────

/// Sensor supply relays (active LOW) and the soil ADC inputs.
pub struct SoilSensorBoard {
    powered: [bool; SENSOR_COUNT],
}

impl SoilSensorBoard {
    fn new() -> Self {
        let mut board = Self {
            powered: [true; SENSOR_COUNT],
        };
        for ch in 0..SENSOR_COUNT {
            board.set_sensor_power(ch, false);
        }
        board
    }

    pub fn is_powered(&self, index: usize) -> bool {
        self.powered.get(index).copied().unwrap_or(false)
    }
}

impl SensorPort for SoilSensorBoard {
    fn read_channel(&mut self, index: usize) -> u16 {
        pins::SOIL_ADC.get(index).map_or(0, |&input| adc_read(input))
    }

    fn set_sensor_power(&mut self, index: usize, on: bool) {
        let Some(&pin) = pins::SENSOR_POWER_GPIO.get(index) else {
            return;
        };
        gpio_write(pin, on == pins::RELAY_5V_ACTIVE_HIGH);
        self.powered[index] = on;
    }
}

// ── Valves and pump ───────────────────────────────────────────

/// Valve relays (active HIGH) and the pump relay (active LOW).
pub struct WateringRelays {
    valves: [bool; VALVE_COUNT],
    pump: bool,
}

impl WateringRelays {
    fn new() -> Self {
        let mut relays = Self {
            valves: [true; VALVE_COUNT],
            pump: true,
        };
        relays.all_off();
        relays
    }

    pub fn is_pump_on(&self) -> bool {
        self.pump
    }

    pub fn is_valve_open(&self, index: usize) -> bool {
        self.valves.get(index).copied().unwrap_or(false)
    }
}

impl ActuatorPort for WateringRelays {
    fn set_valve(&mut self, index: usize, open: bool) {
        let Some(&pin) = pins::VALVE_GPIO.get(index) else {
            return;
        };
        gpio_write(pin, open == pins::VALVE_ACTIVE_HIGH);
        self.valves[index] = open;
        debug!("Relay: valve {} {}", index, if open { "open" } else { "closed" });
    }

    fn set_pump(&mut self, on: bool) {
        gpio_write(pins::PUMP_GPIO, on == pins::RELAY_5V_ACTIVE_HIGH);
        self.pump = on;
        debug!("Relay: pump {}", if on { "on" } else { "off" });
    }
}
