//! Raw GPIO output helpers.
//!
//! On ESP-IDF these call straight into the IDF GPIO driver.  On the host
//! the output levels are kept in memory so tests can observe them through
//! [`sim_level`].

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU64, Ordering};

/// Errors from output configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioError {
    ConfigFailed(i32),
}

impl core::fmt::Display for GpioError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
        }
    }
}

// ── ESP-IDF ───────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub fn init_output(pin: i32) -> Result<(), GpioError> {
    // SAFETY: called once per pin from the main task before the loop runs.
    unsafe {
        gpio_reset_pin(pin);
        let rc = gpio_set_direction(pin, gpio_mode_t_GPIO_MODE_OUTPUT);
        if rc != ESP_OK as i32 {
            return Err(GpioError::ConfigFailed(rc));
        }
    }
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn write(pin: i32, high: bool) {
    // SAFETY: pin was configured as an output by init_output(). Main-loop only.
    unsafe {
        gpio_set_level(pin, u32::from(high));
    }
}

// ── Host simulation ───────────────────────────────────────────

/// One bit per GPIO number (0..64).
#[cfg(not(target_os = "espidf"))]
static SIM_LEVELS: AtomicU64 = AtomicU64::new(0);

#[cfg(not(target_os = "espidf"))]
pub fn init_output(pin: i32) -> Result<(), GpioError> {
    if (0..64).contains(&pin) {
        Ok(())
    } else {
        Err(GpioError::ConfigFailed(pin))
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn write(pin: i32, high: bool) {
    if !(0..64).contains(&pin) {
        return;
    }
    let bit = 1u64 << pin;
    if high {
        SIM_LEVELS.fetch_or(bit, Ordering::Relaxed);
    } else {
        SIM_LEVELS.fetch_and(!bit, Ordering::Relaxed);
    }
}

/// Level last written to `pin`.
#[cfg(not(target_os = "espidf"))]
pub fn sim_level(pin: i32) -> bool {
    (0..64).contains(&pin) && SIM_LEVELS.load(Ordering::Relaxed) & (1u64 << pin) != 0
}
