//! Local actuator drivers.

pub mod gpio;
pub mod relay;

pub use relay::RelaySwitch;
