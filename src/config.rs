//! Node configuration.
//!
//! One JSON document describes everything a node does on the bus: the
//! remote peers it polls as master and, optionally, the register file it
//! serves as slave.  Keys are assigned here once and never renumbered at
//! runtime.  [`load`] parses and validates in one go; nothing that fails
//! validation ever reaches the bus.

use serde::{Deserialize, Serialize};

use crate::client::MAX_BINDINGS;
use crate::error::ConfigError;
use crate::protocol::{BusAddress, DecodeKind, KeyWidth, Reading, RegistryKey, SwitchKeys, SwitchProtocol};
use crate::service::MAX_REGISTERS;

/// Poll / update interval used when the config does not name one.
pub const DEFAULT_INTERVAL_MS: u32 = 10_000;

/// Extra attempts for idempotent switch writes.
pub const DEFAULT_WRITE_RETRIES: u8 = 2;

fn default_interval() -> u32 {
    DEFAULT_INTERVAL_MS
}

fn default_retries() -> u8 {
    DEFAULT_WRITE_RETRIES
}

/// Top-level document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Remote peers polled as bus master.
    #[serde(default)]
    pub peers: Vec<PeerConfig>,
    /// Local register file served as bus slave.
    #[serde(default)]
    pub service: Option<ServiceConfig>,
}

/// One remote peer and the keys polled on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    pub name: String,
    /// 7-bit bus address.
    pub address: u8,
    #[serde(default)]
    pub key_width: KeyWidth,
    #[serde(default = "default_interval")]
    pub poll_interval_ms: u32,
    /// Retries for command-pair switch writes.  Toggle writes never retry.
    #[serde(default = "default_retries")]
    pub write_retries: u8,
    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
    #[serde(default)]
    pub switches: Vec<SwitchConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    pub name: String,
    pub key: RegistryKey,
    pub kind: DecodeKind,
}

/// A switch with exactly one key form: `key_turn_on` + `key_turn_off` +
/// `key_read_state`, or `key_toggle` + `key_state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchConfig {
    pub name: String,
    #[serde(flatten)]
    pub keys: SwitchKeys,
}

/// The local register file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// 7-bit address this node answers on.
    pub address: u8,
    #[serde(default)]
    pub key_width: KeyWidth,
    /// Local telemetry refresh interval.
    #[serde(default = "default_interval")]
    pub update_interval_ms: u32,
    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
    #[serde(default)]
    pub switches: Vec<SwitchConfig>,
    #[serde(default)]
    pub values: Vec<ValueConfig>,
}

/// Read/write value slot (calibration and similar).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueConfig {
    pub name: String,
    pub key: RegistryKey,
    pub kind: DecodeKind,
    /// Value served before the first bus write.  Without one the slot
    /// NACKs reads until written.
    #[serde(default)]
    pub initial: Option<f32>,
}

impl ValueConfig {
    /// `initial` converted to the slot's kind.
    pub fn initial_reading(&self) -> Option<Reading> {
        let v = self.initial?;
        match self.kind {
            DecodeKind::Counter => Some(Reading::Counter(v as u32)),
            DecodeKind::SignalStrength => Some(Reading::SignalStrength(v as i8)),
            DecodeKind::Measurement | DecodeKind::MeasurementI16 | DecodeKind::MeasurementU16 => {
                Some(Reading::Measurement(v))
            }
            DecodeKind::State => Some(Reading::State(v != 0.0)),
            DecodeKind::Trigger => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Parse and validate a JSON config document.
pub fn load(json: &str) -> Result<NodeConfig, ConfigError> {
    let config: NodeConfig = serde_json::from_str(json).map_err(|e| ConfigError::Malformed {
        line: e.line(),
        column: e.column(),
    })?;
    config.validate()?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Tracks keys and endpoint names claimed on one peer or register file.
struct KeyLedger<'a> {
    width: KeyWidth,
    seen: Vec<RegistryKey>,
    names: Vec<&'a str>,
}

impl<'a> KeyLedger<'a> {
    fn new(width: KeyWidth) -> Self {
        Self {
            width,
            seen: Vec::new(),
            names: Vec::new(),
        }
    }

    /// Endpoints are looked up by name, so a second one with the same
    /// name could never be reached.  `key` identifies the duplicate.
    fn claim_name(&mut self, name: &'a str, key: RegistryKey) -> Result<(), ConfigError> {
        if self.names.contains(&name) {
            return Err(ConfigError::DuplicateName(key.get()));
        }
        self.names.push(name);
        Ok(())
    }

    fn claim(&mut self, key: RegistryKey) -> Result<(), ConfigError> {
        if !self.width.fits(key) {
            return Err(ConfigError::KeyOutOfRange(key.get()));
        }
        if self.seen.contains(&key) {
            return Err(ConfigError::DuplicateKey(key.get()));
        }
        self.seen.push(key);
        Ok(())
    }

    fn claim_sensor(&mut self, sensor: &'a SensorConfig) -> Result<(), ConfigError> {
        self.claim_name(&sensor.name, sensor.key)?;
        self.claim(sensor.key)
    }

    fn claim_switch(&mut self, switch: &'a SwitchConfig) -> Result<(), ConfigError> {
        let protocol = SwitchProtocol::from_keys(&switch.keys)?;
        self.claim_name(&switch.name, protocol.state_key())?;
        for key in protocol.keys() {
            self.claim(key)?;
        }
        Ok(())
    }
}

fn check_address(raw: u8) -> Result<BusAddress, ConfigError> {
    BusAddress::new(raw).ok_or(ConfigError::InvalidAddress(raw))
}

fn check_sensor(sensor: &SensorConfig) -> Result<(), ConfigError> {
    if sensor.kind.is_readable() {
        Ok(())
    } else {
        Err(ConfigError::InvalidKind(sensor.key.get()))
    }
}

impl NodeConfig {
    /// Validate every peer and the service.  Stops at the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for peer in &self.peers {
            peer.validate()?;
        }
        if let Some(service) = &self.service {
            service.validate()?;
        }
        Ok(())
    }
}

impl PeerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_address(self.address)?;
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.sensors.len() + self.switches.len() > MAX_BINDINGS {
            return Err(ConfigError::TooManyBindings);
        }

        let mut ledger = KeyLedger::new(self.key_width);
        for sensor in &self.sensors {
            check_sensor(sensor)?;
            ledger.claim_sensor(sensor)?;
        }
        for switch in &self.switches {
            ledger.claim_switch(switch)?;
        }
        Ok(())
    }

    pub fn bus_address(&self) -> Result<BusAddress, ConfigError> {
        check_address(self.address)
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_address(self.address)?;
        if self.update_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }

        let mut ledger = KeyLedger::new(self.key_width);
        for sensor in &self.sensors {
            check_sensor(sensor)?;
            ledger.claim_sensor(sensor)?;
        }
        for switch in &self.switches {
            ledger.claim_switch(switch)?;
        }
        for value in &self.values {
            if !value.kind.is_readable() {
                return Err(ConfigError::InvalidKind(value.key.get()));
            }
            ledger.claim_name(&value.name, value.key)?;
            ledger.claim(value.key)?;
        }
        if ledger.seen.len() > MAX_REGISTERS {
            return Err(ConfigError::TooManyBindings);
        }
        Ok(())
    }

    pub fn bus_address(&self) -> Result<BusAddress, ConfigError> {
        check_address(self.address)
    }
}
