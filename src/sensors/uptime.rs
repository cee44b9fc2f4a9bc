//! Uptime counter in whole seconds.
//!
//! Backed by any [`Clock`]; the counter is as monotonic as the clock.
//! Saturates at `u32::MAX` seconds rather than wrapping.

use crate::app::ports::{Clock, SensorSource};
use crate::protocol::Reading;

pub struct UptimeSensor<C: Clock> {
    clock: C,
}

impl<C: Clock> UptimeSensor<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    pub fn uptime_secs(&self) -> u32 {
        u32::try_from(self.clock.uptime_ms() / 1000).unwrap_or(u32::MAX)
    }
}

impl<C: Clock> SensorSource for UptimeSensor<C> {
    fn sample(&mut self) -> Option<Reading> {
        Some(Reading::Counter(self.uptime_secs()))
    }
}
