//! Single-coil relay on a digital output.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the GPIO via [`gpio`](super::gpio).
//! On host/test: the same calls land in the simulated output levels.

use log::info;

use super::gpio::{self, GpioError};
use crate::app::ports::LocalSwitch;

pub struct RelaySwitch {
    gpio: i32,
    active_low: bool,
    on: bool,
}

impl RelaySwitch {
    /// Configure `gpio` as an output and start with the relay released.
    pub fn new(gpio: i32, active_low: bool) -> Result<Self, GpioError> {
        gpio::init_output(gpio)?;
        let mut relay = Self {
            gpio,
            active_low,
            on: true,
        };
        relay.write_state(false);
        Ok(relay)
    }

    pub fn gpio(&self) -> i32 {
        self.gpio
    }
}

impl LocalSwitch for RelaySwitch {
    fn state(&self) -> bool {
        self.on
    }

    fn write_state(&mut self, on: bool) {
        gpio::write(self.gpio, on != self.active_low);
        if on != self.on {
            info!("Relay GPIO{}: {}", self.gpio, if on { "ON" } else { "OFF" });
        }
        self.on = on;
    }
}
