//! Mock bus and sink for integration tests.
//!
//! [`RecordingBus`] forwards to a [`LoopbackBus`] and records every
//! transaction, so tests can assert on the exact wire traffic.  The peer
//! fixture is a real [`SlaveRegistryService`] whose local endpoints are
//! shared cells the test can poke.

use std::cell::Cell;
use std::rc::Rc;

use i2c_registry::adapters::loopback::LoopbackBus;
use i2c_registry::app::ports::{BusTransport, EventSink, LocalSwitch};
use i2c_registry::config::{self, PeerConfig};
use i2c_registry::error::BusError;
use i2c_registry::{
    BusAddress, DecodeKind, KeyWidth, Reading, RegistryEvent, RegistryKey, ServiceBuilder,
    SlaveRegistryService,
};
use i2c_registry::protocol::SwitchProtocol;

pub const PEER: u8 = 0x42;

pub fn peer_address() -> BusAddress {
    BusAddress::new(PEER).unwrap()
}

// ── Transaction record ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Transaction {
    Read { address: u8, request: Vec<u8> },
    Write { address: u8, frame: Vec<u8> },
}

// ── RecordingBus ──────────────────────────────────────────────

pub struct RecordingBus {
    pub inner: LoopbackBus,
    pub log: Vec<Transaction>,
    /// Writes still to be delivered with their ACK reported as a timeout.
    pub lost_acks: usize,
}

#[allow(dead_code)]
impl RecordingBus {
    pub fn new(inner: LoopbackBus) -> Self {
        Self {
            inner,
            log: Vec::new(),
            lost_acks: 0,
        }
    }

    pub fn peer(&mut self) -> &mut SlaveRegistryService {
        self.inner.service_mut(peer_address()).unwrap()
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.log
            .iter()
            .filter_map(|t| match t {
                Transaction::Write { frame, .. } => Some(frame.clone()),
                Transaction::Read { .. } => None,
            })
            .collect()
    }

    pub fn read_requests(&self) -> Vec<Vec<u8>> {
        self.log
            .iter()
            .filter_map(|t| match t {
                Transaction::Read { request, .. } => Some(request.clone()),
                Transaction::Write { .. } => None,
            })
            .collect()
    }
}

impl BusTransport for RecordingBus {
    fn read(
        &mut self,
        address: BusAddress,
        request: &[u8],
        buf: &mut [u8],
    ) -> Result<usize, BusError> {
        self.log.push(Transaction::Read {
            address: address.get(),
            request: request.to_vec(),
        });
        self.inner.read(address, request, buf)
    }

    fn write(&mut self, address: BusAddress, frame: &[u8]) -> Result<(), BusError> {
        self.log.push(Transaction::Write {
            address: address.get(),
            frame: frame.to_vec(),
        });
        self.inner.write(address, frame)?;
        if self.lost_acks > 0 {
            self.lost_acks -= 1;
            return Err(BusError::Timeout);
        }
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<RegistryEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn count(&self, pred: impl Fn(&RegistryEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &RegistryEvent) {
        self.events.push(*event);
    }
}

// ── Peer fixture ──────────────────────────────────────────────

/// Local switch whose state the test can see and change.
pub struct SharedSwitch(pub Rc<Cell<bool>>);

impl LocalSwitch for SharedSwitch {
    fn state(&self) -> bool {
        self.0.get()
    }

    fn write_state(&mut self, on: bool) {
        self.0.set(on);
    }
}

/// Knobs on the simulated peer.
#[derive(Clone)]
pub struct PeerHandles {
    pub rssi: Rc<Cell<i8>>,
    pub uptime: Rc<Cell<u32>>,
    pub fan: Rc<Cell<bool>>,
    pub lamp: Rc<Cell<bool>>,
}

/// Peer at 0x42 serving:
///
/// | key  | endpoint             |
/// |------|----------------------|
/// | 0x10 | wifi signal (i8)     |
/// | 0x11 | uptime (u32)         |
/// | 0x20 | fan on               |
/// | 0x21 | fan state            |
/// | 0x22 | fan off              |
/// | 0x30 | lamp toggle          |
/// | 0x31 | lamp state           |
pub fn peer() -> (LoopbackBus, PeerHandles) {
    peer_booted_at(1234)
}

/// [`peer`] with its first uptime sample at `uptime` seconds.
pub fn peer_booted_at(uptime: u32) -> (LoopbackBus, PeerHandles) {
    let handles = PeerHandles {
        rssi: Rc::new(Cell::new(-60)),
        uptime: Rc::new(Cell::new(uptime)),
        fan: Rc::new(Cell::new(false)),
        lamp: Rc::new(Cell::new(false)),
    };
    let rssi = handles.rssi.clone();
    let uptime = handles.uptime.clone();

    let mut svc = ServiceBuilder::new(PEER, KeyWidth::Bits8)
        .sensor("wifi signal", RegistryKey(0x10), DecodeKind::SignalStrength, move || {
            Some(Reading::SignalStrength(rssi.get()))
        })
        .sensor("uptime", RegistryKey(0x11), DecodeKind::Counter, move || {
            Some(Reading::Counter(uptime.get()))
        })
        .switch(
            "fan",
            SwitchProtocol::CommandPair {
                turn_on: RegistryKey(0x20),
                turn_off: RegistryKey(0x22),
                read_state: RegistryKey(0x21),
            },
            SharedSwitch(handles.fan.clone()),
        )
        .switch(
            "lamp",
            SwitchProtocol::Toggle {
                toggle: RegistryKey(0x30),
                state: RegistryKey(0x31),
            },
            SharedSwitch(handles.lamp.clone()),
        )
        .build()
        .unwrap();
    svc.update();

    let mut bus = LoopbackBus::new();
    bus.attach(svc);
    (bus, handles)
}

/// Master-side view of [`peer`].
pub fn peer_config() -> PeerConfig {
    let doc = r#"{
        "peers": [ {
            "name": "bench",
            "address": 66,
            "poll_interval_ms": 1000,
            "write_retries": 2,
            "sensors": [
                { "name": "wifi signal", "key": 16, "kind": "signal_strength" },
                { "name": "uptime",      "key": 17, "kind": "counter" }
            ],
            "switches": [
                { "name": "fan",  "key_turn_on": 32, "key_turn_off": 34, "key_read_state": 33 },
                { "name": "lamp", "key_toggle": 48, "key_state": 49 }
            ]
        } ]
    }"#;
    config::load(doc).unwrap().peers.remove(0)
}
