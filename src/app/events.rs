//! Outbound registry events.
//!
//! The [`ClientRegistryPoller`](crate::client::ClientRegistryPoller) emits
//! these through the [`EventSink`](super::ports::EventSink) port at the end
//! of each poll cycle, in configuration order.  Adapters decide where they
//! go: the serial log, a host framework's entities, a test recorder.

use crate::client::{CycleOutcome, EndpointId};
use crate::error::TransactionError;
use crate::protocol::{BusAddress, Reading, RegistryKey};

/// Structured events emitted by the poller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegistryEvent {
    /// A sensor key decoded successfully.
    SensorUpdated {
        peer: BusAddress,
        id: EndpointId,
        key: RegistryKey,
        reading: Reading,
    },

    /// A sensor went from valid (or never polled) to stale.  Emitted once
    /// per transition, not on every failed poll.
    SensorStale {
        peer: BusAddress,
        id: EndpointId,
        key: RegistryKey,
        error: TransactionError,
    },

    /// A switch state key was read back.
    SwitchConfirmed {
        peer: BusAddress,
        id: EndpointId,
        key: RegistryKey,
        on: bool,
    },

    /// A switch went stale.  Same once-per-transition rule as sensors.
    SwitchStale {
        peer: BusAddress,
        id: EndpointId,
        key: RegistryKey,
        error: TransactionError,
    },

    /// An uptime counter went backwards: the peer rebooted.
    PeerRestarted {
        peer: BusAddress,
        id: EndpointId,
        previous: u32,
        current: u32,
    },

    /// A poll cycle finished.
    CycleCompleted {
        peer: BusAddress,
        outcome: CycleOutcome,
        failed: usize,
    },
}
