//! Slave-side registry service.
//!
//! Answers bus transactions addressed to this node by dispatching them to
//! the [`RegisterFile`], and keeps telemetry fresh on its own timer so a
//! master reading at any moment sees a recent value.
//!
//! ```text
//!  SlavePort ──bytes──▶ rx ──frame_boundary──▶ handle_frame ──▶ RegisterFile
//!                                                   │
//!                           Staged / Ack / Nack ◀───┘
//!                                             │
//!                          WriteEffect::Command ──▶ LocalSwitch
//!
//!  Scheduler ──▶ update() ──▶ SensorSource::sample ──▶ RegisterFile::store
//!                        └──▶ LocalSwitch::state  ──▶ state key resync
//! ```

mod builder;
mod register_file;

pub use builder::{LocalEndpoint, ServiceBuilder};
pub use register_file::{
    Direction, Endpoint, FrameBoundary, MAX_REGISTERS, RegisterFile, SlotInfo, WriteEffect,
};

use log::{debug, info, trace, warn};

use crate::app::ports::{BusAddressed, LocalSwitch, Pollable, SensorSource, SlavePort};
use crate::error::BusError;
use crate::protocol::{
    BusAddress, DecodeKind, MAX_FRAME, Payload, Reading, RegistryKey, SwitchOp, SwitchProtocol,
    parse_frame,
};

/// Upper bound on frames handled per [`SlaveRegistryService::serve`] call.
const MAX_FRAMES_PER_SERVE: usize = 8;

const RX_CAPACITY: usize = MAX_FRAMES_PER_SERVE * MAX_FRAME;

/// Bytes received but not yet framed.
type RxBuffer = heapless::Vec<u8, RX_CAPACITY>;

/// How the service answers one incoming frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlaveResponse {
    /// Read request: these bytes go back to the master.
    Staged(Payload),
    /// Write accepted.
    Ack,
    /// Unknown key, wrong direction, malformed frame or empty slot.
    Nack,
}

pub(crate) struct SensorEntry {
    pub(crate) name: String,
    pub(crate) key: RegistryKey,
    pub(crate) kind: DecodeKind,
    pub(crate) source: Box<dyn SensorSource>,
}

pub(crate) struct SwitchEntry {
    pub(crate) name: String,
    pub(crate) protocol: SwitchProtocol,
    pub(crate) switch: Box<dyn LocalSwitch>,
}

pub(crate) struct ValueEntry {
    pub(crate) name: String,
    pub(crate) key: RegistryKey,
}

/// Register file plus the local endpoints bound into it.
///
/// Construct with [`ServiceBuilder`].
pub struct SlaveRegistryService {
    address: BusAddress,
    update_interval_ms: u32,
    registers: RegisterFile,
    sensors: Vec<SensorEntry>,
    switches: Vec<SwitchEntry>,
    values: Vec<ValueEntry>,
    rx: RxBuffer,
}

impl SlaveRegistryService {
    pub(crate) fn from_parts(
        address: BusAddress,
        update_interval_ms: u32,
        registers: RegisterFile,
        sensors: Vec<SensorEntry>,
        switches: Vec<SwitchEntry>,
        values: Vec<ValueEntry>,
    ) -> Self {
        Self {
            address,
            update_interval_ms,
            registers,
            sensors,
            switches,
            values,
            rx: RxBuffer::new(),
        }
    }

    /// Answer one frame the master wrote to us.
    ///
    /// A frame of exactly key width is a read request; anything longer is
    /// a write; anything shorter is malformed.
    pub fn handle_frame(&mut self, frame: &[u8]) -> SlaveResponse {
        let (key, payload) = match parse_frame(frame, self.registers.key_width()) {
            Ok(parts) => parts,
            Err(e) => {
                debug!("Service: malformed frame {:02X?}: {}", frame, e);
                return SlaveResponse::Nack;
            }
        };

        if payload.is_empty() {
            return match self.registers.read(key) {
                Ok(bytes) => {
                    trace!("Service: read {} -> {:02X?}", key, bytes.as_slice());
                    SlaveResponse::Staged(bytes)
                }
                Err(e) => {
                    debug!("Service: read {} rejected: {}", key, e);
                    SlaveResponse::Nack
                }
            };
        }

        match self.registers.write(key, payload) {
            Ok(WriteEffect::Command { switch, op }) => {
                self.command_switch(switch, op);
                SlaveResponse::Ack
            }
            Ok(WriteEffect::Stored) => SlaveResponse::Ack,
            Err(e) => {
                debug!("Service: write {} rejected: {}", key, e);
                SlaveResponse::Nack
            }
        }
    }

    /// Drain what the master wrote since the last call, split it into
    /// frames and stage responses.
    ///
    /// The port hands over a byte stream; frame boundaries come from the
    /// register file.  A partial frame waits for one more call and is
    /// dropped if nothing arrives by then.  Returns the number of frames
    /// handled.  Never blocks beyond what the port does.
    pub fn serve<P: SlavePort>(&mut self, port: &mut P) -> Result<usize, BusError> {
        let mut chunk = [0u8; RX_CAPACITY];
        let mut received = false;
        for _ in 0..MAX_FRAMES_PER_SERVE {
            let n = port.receive(&mut chunk)?.min(RX_CAPACITY);
            if n == 0 {
                break;
            }
            received = true;
            if self.rx.extend_from_slice(&chunk[..n]).is_err() {
                warn!("Service: RX overflow, dropping {} byte(s)", self.rx.len() + n);
                self.rx.clear();
            }
        }

        let head = self.registers.key_width().len();
        let mut handled = 0;
        while handled < MAX_FRAMES_PER_SERVE && !self.rx.is_empty() {
            let len = match self.registers.frame_boundary(&self.rx) {
                FrameBoundary::Complete(len) => len.min(MAX_FRAME),
                FrameBoundary::Partial => {
                    if !received {
                        debug!("Service: dropping partial frame {:02X?}", self.rx.as_slice());
                        self.rx.clear();
                    }
                    break;
                }
                FrameBoundary::Unknown => {
                    debug!("Service: unknown key in {:02X?}, resyncing", self.rx.as_slice());
                    self.rx.clear();
                    port.respond(&[])?;
                    break;
                }
            };

            let mut frame = [0u8; MAX_FRAME];
            frame[..len].copy_from_slice(&self.rx[..len]);
            self.rx.rotate_left(len);
            self.rx.truncate(self.rx.len() - len);
            handled += 1;

            match self.handle_frame(&frame[..len]) {
                SlaveResponse::Staged(bytes) => port.respond(&bytes)?,
                // Nothing stale may answer a refused read.
                SlaveResponse::Nack if len == head => port.respond(&[])?,
                SlaveResponse::Nack | SlaveResponse::Ack => {}
            }
        }
        Ok(handled)
    }

    /// Local timer: sample every source and resync switch state keys.
    pub fn update(&mut self) {
        for sensor in &mut self.sensors {
            let Some(reading) = sensor.source.sample() else {
                continue;
            };
            let reading = match (reading, self.registers.get(sensor.key)) {
                // Counters never run backwards on our side of the bus.
                (Reading::Counter(new), Some(Reading::Counter(old))) if new < old => {
                    warn!("Service: '{}' went backwards ({} < {}), holding", sensor.name, new, old);
                    Reading::Counter(old)
                }
                (r, _) => r,
            };
            if let Err(e) = self.registers.store(sensor.key, reading) {
                warn!("Service: '{}' sample not stored: {}", sensor.name, e);
            }
        }

        for entry in &self.switches {
            let key = entry.protocol.state_key();
            let on = entry.switch.state();
            if self.registers.get(key) != Some(Reading::State(on)) {
                debug!("Service: '{}' changed locally -> {}", entry.name, on);
                let _ = self.registers.store(key, Reading::State(on));
            }
        }
    }

    /// Current value of `key`, decoded.  Mostly useful for read/write
    /// value slots the master sets.
    pub fn value(&self, key: RegistryKey) -> Option<Reading> {
        self.registers.get(key)
    }

    /// State of the `index`-th bound switch, in bind order.
    pub fn switch_state(&self, index: usize) -> Option<bool> {
        self.switches.get(index).map(|s| s.switch.state())
    }

    pub fn dump_config(&self) {
        info!("Registry service:");
        info!("  Address: {}", self.address);
        info!("  Key width: {} byte(s)", self.registers.key_width().len());
        info!("  Update interval: {} ms", self.update_interval_ms);
        for sensor in &self.sensors {
            info!("  Sensor '{}': key {} ({:?})", sensor.name, sensor.key, sensor.kind);
        }
        for entry in &self.switches {
            match entry.protocol {
                SwitchProtocol::CommandPair {
                    turn_on,
                    turn_off,
                    read_state,
                } => info!(
                    "  Switch '{}': on {} off {} state {}",
                    entry.name, turn_on, turn_off, read_state
                ),
                SwitchProtocol::Toggle { toggle, state } => {
                    info!("  Switch '{}': toggle {} state {}", entry.name, toggle, state);
                }
            }
        }
        for value in &self.values {
            info!(
                "  Value '{}': key {} = {:?}",
                value.name,
                value.key,
                self.registers.get(value.key)
            );
        }
        for slot in self.registers.slots() {
            debug!(
                "  Register {}: {:?} {:?}{}",
                slot.key,
                slot.direction,
                slot.kind,
                if slot.populated { "" } else { " (empty)" }
            );
        }
    }

    fn command_switch(&mut self, index: usize, op: SwitchOp) {
        let Some(entry) = self.switches.get_mut(index) else {
            return;
        };
        let target = op.apply(entry.switch.state());
        info!("Service: '{}' {:?} -> {}", entry.name, op, target);
        entry.switch.write_state(target);
        let confirmed = entry.switch.state();
        let _ = self
            .registers
            .store(entry.protocol.state_key(), Reading::State(confirmed));
    }
}

impl Pollable for SlaveRegistryService {
    fn label(&self) -> &str {
        "service"
    }

    fn update_interval_ms(&self) -> u32 {
        self.update_interval_ms
    }
}

impl BusAddressed for SlaveRegistryService {
    fn bus_address(&self) -> BusAddress {
        self.address
    }
}
