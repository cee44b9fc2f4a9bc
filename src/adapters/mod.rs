//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements    | Connects to                   |
//! |------------|---------------|-------------------------------|
//! | `esp_i2c`  | BusTransport  | ESP-IDF I²C master driver     |
//! |            | SlavePort     | ESP-IDF I²C slave driver      |
//! | `hal_bus`  | BusTransport  | Any embedded-hal 1.0 I²C      |
//! | `log_sink` | EventSink     | Serial log output             |
//! | `loopback` | BusTransport  | In-memory slave services      |
//! | `time`     | Clock         | ESP32 system timer / Instant  |

#[cfg(target_os = "espidf")]
pub mod esp_i2c;
pub mod hal_bus;
pub mod log_sink;
pub mod loopback;
pub mod time;
