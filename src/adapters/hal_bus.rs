//! [`BusTransport`] over any `embedded-hal` 1.0 I²C master.
//!
//! The HAL's `write_read` fills the whole buffer or fails, so a
//! successful read always reports the requested length.  Timeouts are
//! whatever the HAL implementation enforces.

use embedded_hal::i2c::{Error as _, ErrorKind, I2c};

use crate::app::ports::BusTransport;
use crate::error::BusError;
use crate::protocol::BusAddress;

pub struct HalBus<I> {
    i2c: I,
}

impl<I: I2c> HalBus<I> {
    pub fn new(i2c: I) -> Self {
        Self { i2c }
    }

    /// Give the peripheral back.
    pub fn release(self) -> I {
        self.i2c
    }
}

/// Map a HAL error onto the bus taxonomy.
pub fn map_error(kind: ErrorKind) -> BusError {
    match kind {
        ErrorKind::NoAcknowledge(_) => BusError::NotAcknowledged,
        ErrorKind::ArbitrationLoss => BusError::ArbitrationLost,
        ErrorKind::Overrun => BusError::TooLarge,
        _ => BusError::Bus,
    }
}

impl<I: I2c> BusTransport for HalBus<I> {
    fn read(
        &mut self,
        address: BusAddress,
        request: &[u8],
        buf: &mut [u8],
    ) -> Result<usize, BusError> {
        self.i2c
            .write_read(address.get(), request, buf)
            .map_err(|e| map_error(e.kind()))?;
        Ok(buf.len())
    }

    fn write(&mut self, address: BusAddress, frame: &[u8]) -> Result<(), BusError> {
        self.i2c
            .write(address.get(), frame)
            .map_err(|e| map_error(e.kind()))
    }
}
