//! Application boundary: port traits and outbound events.
//!
//! Everything the protocol core needs from the platform (bus, local
//! sensors and switches, time, event consumers) is expressed as a
//! **port trait** in [`ports`], keeping the core fully testable without
//! real peripherals.

pub mod events;
pub mod ports;
