//! Registry node firmware: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  EspMasterBus     EspSlavePort    LogEventSink   MonotonicClock│
//! │  (BusTransport)   (SlavePort)     (EventSink)    (Clock)       │
//! │  RelaySwitch      SignalStrengthSensor  UptimeSensor           │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │                  Node (pure logic)                     │    │
//! │  │  ClientRegistryPoller × N · SlaveRegistryService       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Scheduler (delegate-driven, one slot per poller / service)    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use anyhow::Result;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::AnyIOPin;
use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver, I2cSlaveConfig, I2cSlaveDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::units::Hertz;
use log::{info, warn};

use i2c_registry::Node;
use i2c_registry::adapters::esp_i2c::{EspMasterBus, EspSlavePort};
use i2c_registry::adapters::log_sink::LogEventSink;
use i2c_registry::adapters::time::MonotonicClock;
use i2c_registry::app::ports::Clock;
use i2c_registry::config;
use i2c_registry::drivers::RelaySwitch;
use i2c_registry::pins;
use i2c_registry::sensors::{SignalStrengthSensor, UptimeSensor};
use i2c_registry::service::LocalEndpoint;

/// Main loop period.  Bounds slave response latency, not poll timing;
/// stays below `pins::I2C_RESPONSE_DELAY_MS` so peers reading us find
/// their reply staged.
const LOOP_PERIOD_MS: u32 = 10;
const _: () = assert!(LOOP_PERIOD_MS < pins::I2C_RESPONSE_DELAY_MS);

/// Slave driver FIFO sizes.
const SLAVE_BUFFER_LEN: usize = 128;

// ── Local endpoints ───────────────────────────────────────────
//
// Names match `config/node.json`.  Anything the config names but this
// function does not know fails the boot with `UnresolvedEndpoint`.

fn resolve_endpoint(name: &str) -> Option<LocalEndpoint> {
    match name {
        "wifi signal" => Some(LocalEndpoint::Sensor(Box::new(SignalStrengthSensor::new()))),
        "uptime" => Some(LocalEndpoint::Sensor(Box::new(UptimeSensor::new(
            MonotonicClock::new(),
        )))),
        "relay" => match RelaySwitch::new(pins::RELAY_GPIO, false) {
            Ok(relay) => Some(LocalEndpoint::Switch(Box::new(relay))),
            Err(e) => {
                warn!("Relay on GPIO{} unavailable: {}", pins::RELAY_GPIO, e);
                None
            }
        },
        _ => None,
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  I2C registry node v{}            ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let config = config::load(include_str!("../config/node.json"))?;
    let mut node = Node::from_config(&config, resolve_endpoint)?;
    node.dump_config();

    // ── 3. Bus peripherals ────────────────────────────────────
    let peripherals = Peripherals::take()?;

    // SAFETY: the pin numbers come from `pins` and are not claimed by
    // any other driver.
    let (m_sda, m_scl) = unsafe {
        (
            AnyIOPin::new(pins::I2C_MASTER_SDA_GPIO),
            AnyIOPin::new(pins::I2C_MASTER_SCL_GPIO),
        )
    };
    let master = I2cDriver::new(
        peripherals.i2c0,
        m_sda,
        m_scl,
        &I2cConfig::new().baudrate(Hertz(pins::I2C_FREQ_HZ)),
    )?;
    let mut bus = EspMasterBus::new(master, pins::I2C_TIMEOUT_MS, pins::I2C_RESPONSE_DELAY_MS);

    let mut slave = match &config.service {
        Some(svc) => {
            // SAFETY: as above.
            let (s_sda, s_scl) = unsafe {
                (
                    AnyIOPin::new(pins::I2C_SLAVE_SDA_GPIO),
                    AnyIOPin::new(pins::I2C_SLAVE_SCL_GPIO),
                )
            };
            let driver = I2cSlaveDriver::new(
                peripherals.i2c1,
                s_sda,
                s_scl,
                svc.address,
                &I2cSlaveConfig::new()
                    .rx_buffer_length(SLAVE_BUFFER_LEN)
                    .tx_buffer_length(SLAVE_BUFFER_LEN),
            )?;
            info!("Slave port listening on 0x{:02X}", svc.address);
            Some(EspSlavePort::new(
                driver,
                pins::I2C_SLAVE_PORT,
                pins::I2C_TIMEOUT_MS,
            ))
        }
        None => None,
    };

    // ── 4. First pass ─────────────────────────────────────────
    let mut sink = LogEventSink::new();
    let clock = MonotonicClock::new();
    node.start(&mut bus, &mut sink);

    info!("Node ready. Entering main loop.");

    // ── 5. Main loop ──────────────────────────────────────────
    let mut last_ms = clock.uptime_ms();
    loop {
        if let Some(port) = &mut slave {
            if let Err(e) = node.serve(port) {
                warn!("Slave port: {}", e);
            }
        }

        let now_ms = clock.uptime_ms();
        let elapsed = u32::try_from(now_ms.saturating_sub(last_ms)).unwrap_or(u32::MAX);
        last_ms = now_ms;
        node.tick(elapsed, &mut bus, &mut sink);

        FreeRtos::delay_ms(LOOP_PERIOD_MS);
    }
}
