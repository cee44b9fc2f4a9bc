//! Key-addressed I²C registry firmware library.
//!
//! A node polls remote peers as bus master ([`client`]) and answers a
//! remote master as bus slave ([`service`]), both speaking the same
//! key/payload wire protocol ([`protocol`]).  All ESP-IDF-specific code
//! is guarded by `#[cfg(target_os = "espidf")]` within each module, so
//! everything else builds and tests on the host.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod client;
pub mod config;
pub mod drivers;
pub mod error;
pub mod node;
pub mod pins;
pub mod protocol;
pub mod scheduler;
pub mod sensors;
pub mod service;

pub use app::events::RegistryEvent;
pub use client::{ClientRegistryPoller, CycleOutcome, CycleReport, EndpointId, PollerState};
pub use error::{BusError, ConfigError, Error, Result, SwitchError};
pub use node::Node;
pub use protocol::{BusAddress, DecodeKind, KeyWidth, Reading, RegistryKey, SwitchCommand};
pub use service::{ServiceBuilder, SlaveRegistryService, SlaveResponse};
