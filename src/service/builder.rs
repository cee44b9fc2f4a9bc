use log::{info, warn};

use super::register_file::{Direction, Endpoint, RegisterFile};
use super::{SensorEntry, SlaveRegistryService, SwitchEntry, ValueEntry};
use crate::app::ports::{LocalSwitch, SensorSource};
use crate::config::{DEFAULT_INTERVAL_MS, ServiceConfig};
use crate::error::ConfigError;
use crate::protocol::{BusAddress, DecodeKind, KeyWidth, Reading, RegistryKey, SwitchProtocol};

/// A local endpoint handed to [`ServiceBuilder::from_config`] by name.
pub enum LocalEndpoint {
    Sensor(Box<dyn SensorSource>),
    Switch(Box<dyn LocalSwitch>),
}

/// Collects bindings for a [`SlaveRegistryService`].
///
/// Every binding is checked as it is added.  The first violation is kept
/// and returned from [`build`](Self::build); later calls are ignored, so
/// a rejected configuration never yields a running service.
pub struct ServiceBuilder {
    address: u8,
    update_interval_ms: u32,
    registers: RegisterFile,
    sensors: Vec<SensorEntry>,
    switches: Vec<SwitchEntry>,
    values: Vec<ValueEntry>,
    error: Option<ConfigError>,
}

impl ServiceBuilder {
    pub fn new(address: u8, key_width: KeyWidth) -> Self {
        Self {
            address,
            update_interval_ms: DEFAULT_INTERVAL_MS,
            registers: RegisterFile::new(key_width),
            sensors: Vec::new(),
            switches: Vec::new(),
            values: Vec::new(),
            error: None,
        }
    }

    pub fn update_interval_ms(mut self, interval_ms: u32) -> Self {
        if interval_ms == 0 {
            self.fail(ConfigError::ZeroInterval);
        }
        self.update_interval_ms = interval_ms;
        self
    }

    /// Publish `source` as read-only telemetry under `key`.
    pub fn sensor(
        self,
        name: &str,
        key: RegistryKey,
        kind: DecodeKind,
        source: impl SensorSource + 'static,
    ) -> Self {
        self.sensor_boxed(name, key, kind, Box::new(source))
    }

    fn sensor_boxed(
        mut self,
        name: &str,
        key: RegistryKey,
        kind: DecodeKind,
        source: Box<dyn SensorSource>,
    ) -> Self {
        if self.error.is_some() {
            return self;
        }
        let endpoint = Endpoint::Sensor {
            source: self.sensors.len(),
        };
        match self.registers.bind(key, endpoint, kind, Direction::Telemetry) {
            Ok(()) => self.sensors.push(SensorEntry {
                name: name.into(),
                key,
                kind,
                source,
            }),
            Err(e) => self.fail(e),
        }
        self
    }

    /// Bind a local switch with the given key layout.  The state key is
    /// seeded with the switch's current state.
    pub fn switch(
        self,
        name: &str,
        protocol: SwitchProtocol,
        switch: impl LocalSwitch + 'static,
    ) -> Self {
        self.switch_boxed(name, protocol, Box::new(switch))
    }

    fn switch_boxed(
        mut self,
        name: &str,
        protocol: SwitchProtocol,
        switch: Box<dyn LocalSwitch>,
    ) -> Self {
        if self.error.is_some() {
            return self;
        }
        let index = self.switches.len();
        let state_key = protocol.state_key();

        let mut result = self.registers.bind(
            state_key,
            Endpoint::SwitchState { switch: index },
            DecodeKind::State,
            Direction::Telemetry,
        );
        for (key, op) in protocol.action_keys() {
            result = result.and_then(|()| {
                self.registers.bind(
                    key,
                    Endpoint::SwitchAction { switch: index, op },
                    DecodeKind::Trigger,
                    Direction::Action,
                )
            });
        }

        match result {
            Ok(()) => {
                let _ = self
                    .registers
                    .store(state_key, Reading::State(switch.state()));
                self.switches.push(SwitchEntry {
                    name: name.into(),
                    protocol,
                    switch,
                });
            }
            Err(e) => self.fail(e),
        }
        self
    }

    /// Read/write value slot, optionally pre-populated.
    pub fn value(
        mut self,
        name: &str,
        key: RegistryKey,
        kind: DecodeKind,
        initial: Option<Reading>,
    ) -> Self {
        if self.error.is_some() {
            return self;
        }
        let bound = self
            .registers
            .bind(key, Endpoint::Value, kind, Direction::ReadWrite);
        let seeded = bound.and_then(|()| match initial {
            Some(reading) => self
                .registers
                .store(key, reading)
                .map_err(|_| ConfigError::InvalidKind(key.get())),
            None => Ok(()),
        });
        match seeded {
            Ok(()) => self.values.push(ValueEntry {
                name: name.into(),
                key,
            }),
            Err(e) => self.fail(e),
        }
        self
    }

    pub fn build(self) -> Result<SlaveRegistryService, ConfigError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let address = BusAddress::new(self.address).ok_or(ConfigError::InvalidAddress(self.address))?;
        info!(
            "Service: {} registers bound at {}",
            self.registers.len(),
            address
        );
        Ok(SlaveRegistryService::from_parts(
            address,
            self.update_interval_ms,
            self.registers,
            self.sensors,
            self.switches,
            self.values,
        ))
    }

    /// Build from a [`ServiceConfig`], resolving every sensor and switch
    /// by name through `resolve`.  A missing endpoint, or one of the wrong
    /// variant, is fatal.
    pub fn from_config<F>(config: &ServiceConfig, mut resolve: F) -> Result<SlaveRegistryService, ConfigError>
    where
        F: FnMut(&str) -> Option<LocalEndpoint>,
    {
        config.validate()?;

        let mut builder = Self::new(config.address, config.key_width)
            .update_interval_ms(config.update_interval_ms);

        for sensor in &config.sensors {
            let Some(LocalEndpoint::Sensor(source)) = resolve(&sensor.name) else {
                return Err(ConfigError::UnresolvedEndpoint(sensor.key.get()));
            };
            builder = builder.sensor_boxed(&sensor.name, sensor.key, sensor.kind, source);
        }
        for switch in &config.switches {
            let protocol = SwitchProtocol::from_keys(&switch.keys)?;
            let Some(LocalEndpoint::Switch(local)) = resolve(&switch.name) else {
                return Err(ConfigError::UnresolvedEndpoint(protocol.state_key().get()));
            };
            builder = builder.switch_boxed(&switch.name, protocol, local);
        }
        for value in &config.values {
            builder = builder.value(&value.name, value.key, value.kind, value.initial_reading());
        }
        builder.build()
    }

    fn fail(&mut self, e: ConfigError) {
        if self.error.is_none() {
            warn!("Service: configuration rejected: {}", e);
            self.error = Some(e);
        }
    }
}
