//! Local telemetry sources published by the registry service.
//!
//! Each source implements [`SensorSource`](crate::app::ports::SensorSource)
//! and is bound to a registry key by the service builder.

pub mod signal;
pub mod uptime;

pub use signal::SignalStrengthSensor;
pub use uptime::UptimeSensor;
