//! ESP-IDF I²C drivers behind the bus ports.
//!
//! [`EspMasterBus`] wraps an `I2cDriver` in master mode and implements
//! [`BusTransport`]; [`EspSlavePort`] wraps an `I2cSlaveDriver` and
//! implements [`SlavePort`].  Both enforce the bounded timeout from
//! [`pins::I2C_TIMEOUT_MS`](crate::pins::I2C_TIMEOUT_MS).
//!
//! A read is two transactions: the key write, a pause of
//! [`pins::I2C_RESPONSE_DELAY_MS`](crate::pins::I2C_RESPONSE_DELAY_MS)
//! while the peer's main loop stages the reply, then the payload read.
//! The slave hardware cannot stage anything between the two halves of a
//! repeated-start transaction.

use esp_idf_svc::hal::delay::{FreeRtos, TickType};
use esp_idf_svc::hal::i2c::{I2cDriver, I2cSlaveDriver};
use esp_idf_svc::sys::{ESP_ERR_TIMEOUT, ESP_FAIL, EspError, esp, i2c_port_t, i2c_reset_tx_fifo};
use log::trace;

use crate::app::ports::{BusTransport, SlavePort};
use crate::error::BusError;
use crate::protocol::BusAddress;

fn map_esp_error(e: EspError) -> BusError {
    match e.code() {
        c if c == ESP_ERR_TIMEOUT as i32 => BusError::Timeout,
        // The legacy driver reports a missing ACK as a generic failure.
        c if c == ESP_FAIL as i32 => BusError::NotAcknowledged,
        _ => BusError::Bus,
    }
}

// ── Master ────────────────────────────────────────────────────

pub struct EspMasterBus<'d> {
    driver: I2cDriver<'d>,
    timeout: u32,
    response_delay_ms: u32,
}

impl<'d> EspMasterBus<'d> {
    pub fn new(driver: I2cDriver<'d>, timeout_ms: u64, response_delay_ms: u32) -> Self {
        Self {
            driver,
            timeout: TickType::new_millis(timeout_ms).ticks(),
            response_delay_ms,
        }
    }
}

impl BusTransport for EspMasterBus<'_> {
    fn read(
        &mut self,
        address: BusAddress,
        request: &[u8],
        buf: &mut [u8],
    ) -> Result<usize, BusError> {
        self.driver
            .write(address.get(), request, self.timeout)
            .map_err(map_esp_error)?;
        FreeRtos::delay_ms(self.response_delay_ms);
        self.driver
            .read(address.get(), buf, self.timeout)
            .map_err(map_esp_error)?;
        Ok(buf.len())
    }

    fn write(&mut self, address: BusAddress, frame: &[u8]) -> Result<(), BusError> {
        self.driver
            .write(address.get(), frame, self.timeout)
            .map_err(map_esp_error)
    }
}

// ── Slave ─────────────────────────────────────────────────────

pub struct EspSlavePort<'d> {
    driver: I2cSlaveDriver<'d>,
    port: i2c_port_t,
    timeout: u32,
}

impl<'d> EspSlavePort<'d> {
    /// `port` is the controller number `driver` was created on.
    pub fn new(driver: I2cSlaveDriver<'d>, port: i2c_port_t, timeout_ms: u64) -> Self {
        Self {
            driver,
            port,
            timeout: TickType::new_millis(timeout_ms).ticks(),
        }
    }
}

impl SlavePort for EspSlavePort<'_> {
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, BusError> {
        // Poll without blocking; an empty RX ring is not an error.  The
        // ring holds every byte written since the last poll, unframed.
        match self.driver.read(buf, 0) {
            Ok(n) => Ok(n),
            Err(e) if e.code() == ESP_ERR_TIMEOUT as i32 => Ok(0),
            Err(e) => Err(map_esp_error(e)),
        }
    }

    fn respond(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        // Bytes from an answer the master never collected must not lead
        // this one.
        // SAFETY: `port` is the controller this driver installed.
        esp!(unsafe { i2c_reset_tx_fifo(self.port) }).map_err(map_esp_error)?;
        if bytes.is_empty() {
            return Ok(());
        }
        let written = self
            .driver
            .write(bytes, self.timeout)
            .map_err(map_esp_error)?;
        if written < bytes.len() {
            trace!("Slave TX short: {} of {} bytes", written, bytes.len());
            return Err(BusError::TooLarge);
        }
        Ok(())
    }
}
