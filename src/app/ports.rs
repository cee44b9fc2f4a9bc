//! Port traits: the boundary between the registry protocol and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ClientRegistryPoller / SlaveRegistryService
//! ```
//!
//! Bus peripherals, local sensors, relays, clocks and event consumers all
//! live behind these traits.  The poller and the service take them as
//! generics or trait objects, so the protocol core never touches hardware
//! directly and runs unchanged against the loopback bus in tests.

use crate::error::BusError;
use crate::protocol::{BusAddress, Reading};

use super::events::RegistryEvent;

// ───────────────────────────────────────────────────────────────
// Bus transport (master side)
// ───────────────────────────────────────────────────────────────

/// Addressed byte-level transactions on the shared bus.
///
/// One transaction is in flight at a time: implementations either finish
/// with a definite result or give up after a bounded timeout.  Exclusive
/// access comes from `&mut self`; callers sharing a physical bus between
/// several pollers hand the same transport to each poll cycle in turn.
pub trait BusTransport {
    /// Write `request`, then read the response into `buf`.
    ///
    /// Returns the number of bytes the peer actually supplied.  This may
    /// differ from `buf.len()`, and may exceed it, on transports that can
    /// observe the slave's staged length; only `buf.len()` bytes are copied.
    fn read(
        &mut self,
        address: BusAddress,
        request: &[u8],
        buf: &mut [u8],
    ) -> Result<usize, BusError>;

    /// Write `frame` in a single transaction.
    fn write(&mut self, address: BusAddress, frame: &[u8]) -> Result<(), BusError>;
}

impl<T: BusTransport + ?Sized> BusTransport for &mut T {
    fn read(
        &mut self,
        address: BusAddress,
        request: &[u8],
        buf: &mut [u8],
    ) -> Result<usize, BusError> {
        (**self).read(address, request, buf)
    }

    fn write(&mut self, address: BusAddress, frame: &[u8]) -> Result<(), BusError> {
        (**self).write(address, frame)
    }
}

// ───────────────────────────────────────────────────────────────
// Slave port (slave side)
// ───────────────────────────────────────────────────────────────

/// Peripheral in slave mode, addressed by the master.
pub trait SlavePort {
    /// Pull bytes the master wrote to us.  Consecutive writes may arrive
    /// in one call or one write across several; frame boundaries are not
    /// preserved.  `Ok(0)` means nothing is pending.
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, BusError>;

    /// Stage bytes for the master's next read, replacing anything staged
    /// before.  Empty clears the staged response.
    fn respond(&mut self, bytes: &[u8]) -> Result<(), BusError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink (domain → logging / host framework)
// ───────────────────────────────────────────────────────────────

/// Receives decoded values and confirmed switch states from the poller.
/// This is where a host automation framework attaches its entities.
pub trait EventSink {
    fn emit(&mut self, event: &RegistryEvent);
}

/// Discards everything.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &RegistryEvent) {}
}

// ───────────────────────────────────────────────────────────────
// Local endpoints (slave side)
// ───────────────────────────────────────────────────────────────

/// A locally attached value the service publishes under a registry key.
pub trait SensorSource {
    /// Current value, or `None` if the source has nothing valid yet.
    fn sample(&mut self) -> Option<Reading>;
}

impl<F> SensorSource for F
where
    F: FnMut() -> Option<Reading>,
{
    fn sample(&mut self) -> Option<Reading> {
        self()
    }
}

/// A locally attached switch the service drives on behalf of the master.
pub trait LocalSwitch {
    /// Last commanded or confirmed state.
    fn state(&self) -> bool;

    /// Drive the switch.  The new state is visible through [`state`]
    /// once this returns.
    ///
    /// [`state`]: LocalSwitch::state
    fn write_state(&mut self, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Time
// ───────────────────────────────────────────────────────────────

/// Monotonic time since boot.
pub trait Clock {
    fn uptime_ms(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn uptime_ms(&self) -> u64 {
        (**self).uptime_ms()
    }
}

// ───────────────────────────────────────────────────────────────
// Capabilities composed onto pollers and services
// ───────────────────────────────────────────────────────────────

/// Something the scheduler drives on a fixed interval.
pub trait Pollable {
    /// Label used for the schedule and in logs.
    fn label(&self) -> &str;

    /// Interval between runs, in milliseconds.
    fn update_interval_ms(&self) -> u32;
}

/// Something that lives at one address on the bus.
pub trait BusAddressed {
    fn bus_address(&self) -> BusAddress;
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate
// ───────────────────────────────────────────────────────────────

/// Callback the [`Scheduler`](crate::scheduler::Scheduler) invokes when a
/// schedule fires.  The main loop implements it to collect which poller
/// or service is due.
pub trait SchedulerDelegate {
    /// * `slot`: scheduler slot that fired.
    /// * `label`: label of the schedule.
    fn on_schedule_fired(&mut self, slot: usize, label: &str);
}
