//! Master-side registry poller.
//!
//! One [`ClientRegistryPoller`] per remote peer.  On every scheduled tick
//! it reads each configured key in configuration order, decodes the
//! payload by the key's decode kind and hands the results to an
//! [`EventSink`].  Switch commands are written whenever a consumer asks,
//! outside the schedule, and confirmed by the next cycle's state read.
//!
//! ```text
//!   Scheduler ──▶ poll_cycle ──▶ PollCycle ──read──▶ BusTransport ──▶ peer
//!                                    │
//!                       flush (cycle end) ──▶ bindings ──▶ EventSink
//!
//!   consumer ──▶ request_switch ──write──▶ BusTransport ──▶ peer
//! ```
//!
//! Bus failures never escape a cycle: a failed key keeps its last value,
//! goes stale, and the cycle moves on to the next key.

mod binding;
mod cycle;

pub use binding::{Binding, EndpointId, Restart, SensorBinding, SwitchBinding, Validity};
pub use cycle::{CycleOutcome, CycleReport, KeyOutcome, PollerState};

use log::{debug, info, trace, warn};

use self::cycle::PollCycle;
use crate::app::events::RegistryEvent;
use crate::app::ports::{BusAddressed, BusTransport, EventSink, Pollable};
use crate::config::PeerConfig;
use crate::error::{BusError, CodecError, ConfigError, SwitchError, TransactionError};
use crate::protocol::codec;
use crate::protocol::{
    BusAddress, DecodeKind, KeyWidth, MAX_PAYLOAD, Reading, RegistryKey, SwitchCommand,
    SwitchProtocol, read_request, write_request,
};

/// Endpoints one poller can hold.
pub const MAX_BINDINGS: usize = 16;

pub struct ClientRegistryPoller {
    name: String,
    address: BusAddress,
    key_width: KeyWidth,
    poll_interval_ms: u32,
    write_retries: u8,
    bindings: heapless::Vec<Binding, MAX_BINDINGS>,
    state: PollerState,
    last_outcome: Option<CycleOutcome>,
    cycles: u32,
}

impl ClientRegistryPoller {
    /// Build a poller from a peer description.  Sensors come first in the
    /// binding table, then switches, each in document order.
    pub fn new(config: &PeerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let address = config.bus_address()?;

        let mut bindings = heapless::Vec::new();
        for sensor in &config.sensors {
            bindings
                .push(Binding::Sensor(SensorBinding::new(&sensor.name, sensor.key, sensor.kind)))
                .map_err(|_| ConfigError::TooManyBindings)?;
        }
        for switch in &config.switches {
            let protocol = SwitchProtocol::from_keys(&switch.keys)?;
            bindings
                .push(Binding::Switch(SwitchBinding::new(&switch.name, protocol)))
                .map_err(|_| ConfigError::TooManyBindings)?;
        }

        Ok(Self {
            name: config.name.clone(),
            address,
            key_width: config.key_width,
            poll_interval_ms: config.poll_interval_ms,
            write_retries: config.write_retries,
            bindings,
            state: PollerState::Idle,
            last_outcome: None,
            cycles: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn last_outcome(&self) -> Option<CycleOutcome> {
        self.last_outcome
    }

    /// Completed cycles since construction.
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Look an endpoint up by its configured name.
    pub fn find(&self, name: &str) -> Option<EndpointId> {
        self.bindings
            .iter()
            .position(|b| b.name() == name)
            .map(EndpointId)
    }

    pub fn sensor(&self, id: EndpointId) -> Option<&SensorBinding> {
        match self.bindings.get(id.0) {
            Some(Binding::Sensor(s)) => Some(s),
            _ => None,
        }
    }

    pub fn switch(&self, id: EndpointId) -> Option<&SwitchBinding> {
        match self.bindings.get(id.0) {
            Some(Binding::Switch(s)) => Some(s),
            _ => None,
        }
    }

    /// Run one poll cycle against the peer.
    ///
    /// Every key is visited even if earlier ones fail.  Results are applied
    /// to the bindings and emitted to `sink` only once all keys are done.
    pub fn poll_cycle<B, S>(&mut self, bus: &mut B, sink: &mut S) -> CycleReport
    where
        B: BusTransport + ?Sized,
        S: EventSink + ?Sized,
    {
        self.state = PollerState::Polling;
        trace!("Poller '{}': cycle {} start", self.name, self.cycles + 1);

        let mut cycle = PollCycle::plan(&self.bindings);
        for visit in cycle.visits() {
            let result = self.read_key(bus, visit.key, visit.kind);
            if let Err(e) = &result {
                debug!("Poller '{}': key {} failed: {}", self.name, visit.key, e);
            }
            cycle.record(visit, result);
        }

        let report = cycle.into_report();
        self.flush(&report, sink);

        self.state = match report.outcome {
            CycleOutcome::Success => PollerState::Success,
            CycleOutcome::Failed => PollerState::Failed,
        };
        self.cycles = self.cycles.wrapping_add(1);
        self.last_outcome = Some(report.outcome);
        sink.emit(&RegistryEvent::CycleCompleted {
            peer: self.address,
            outcome: report.outcome,
            failed: report.failed(),
        });
        self.state = PollerState::Idle;
        report
    }

    /// Ask a remote switch to change state.
    ///
    /// The write is fire-and-forget: on success the binding records the
    /// target as pending, and the next poll cycle confirms it.  Command-pair
    /// writes are retried up to `write_retries` times; toggle writes are
    /// sent exactly once, since a lost ACK on a toggle that did land would
    /// otherwise flip the switch back.
    pub fn request_switch<B>(
        &mut self,
        id: EndpointId,
        command: SwitchCommand,
        bus: &mut B,
    ) -> Result<(), SwitchError>
    where
        B: BusTransport + ?Sized,
    {
        let Some(Binding::Switch(switch)) = self.bindings.get_mut(id.0) else {
            return Err(SwitchError::NotASwitch);
        };

        let expected = switch.expected_state();
        let Some(key) = switch.protocol.plan(command, expected)? else {
            debug!("Poller '{}': '{}' already {:?}", self.name, switch.name, expected);
            return Ok(());
        };

        let payload = codec::trigger_payload();
        let frame = write_request(key, self.key_width, &payload)
            .map_err(|_| SwitchError::Bus(BusError::TooLarge))?;

        let attempts = if switch.protocol.is_idempotent() {
            1 + u32::from(self.write_retries)
        } else {
            1
        };

        let mut last = BusError::Bus;
        for attempt in 1..=attempts {
            match bus.write(self.address, &frame) {
                Ok(()) => {
                    let target = command.target(expected);
                    switch.set_pending(target);
                    info!(
                        "Poller '{}': '{}' {:?} via key {} (attempt {})",
                        self.name, switch.name, command, key, attempt
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "Poller '{}': '{}' write to {} failed: {} (attempt {}/{})",
                        self.name, switch.name, key, e, attempt, attempts
                    );
                    last = e;
                }
            }
        }

        // The toggle may have landed with its ACK lost; only a state read
        // can tell.
        if !switch.protocol.is_idempotent() {
            switch.mark_uncertain();
        }
        Err(SwitchError::Bus(last))
    }

    pub fn dump_config(&self) {
        info!("Registry poller '{}':", self.name);
        info!("  Address: {}", self.address);
        info!("  Key width: {} byte(s)", self.key_width.len());
        info!("  Poll interval: {} ms", self.poll_interval_ms);
        info!("  Write retries: {}", self.write_retries);
        for binding in &self.bindings {
            match binding {
                Binding::Sensor(s) => {
                    info!("  Sensor '{}': key {} ({:?})", s.name, s.key, s.kind);
                }
                Binding::Switch(s) => match s.protocol {
                    SwitchProtocol::CommandPair {
                        turn_on,
                        turn_off,
                        read_state,
                    } => info!(
                        "  Switch '{}': on {} off {} state {}",
                        s.name, turn_on, turn_off, read_state
                    ),
                    SwitchProtocol::Toggle { toggle, state } => {
                        info!("  Switch '{}': toggle {} state {}", s.name, toggle, state);
                    }
                },
            }
        }
    }

    fn read_key<B>(
        &self,
        bus: &mut B,
        key: RegistryKey,
        kind: DecodeKind,
    ) -> Result<Reading, TransactionError>
    where
        B: BusTransport + ?Sized,
    {
        let request =
            read_request(key, self.key_width).map_err(|_| TransactionError::Bus(BusError::Bus))?;
        let mut buf = [0u8; MAX_PAYLOAD];
        let width = kind.width();
        let n = bus.read(self.address, &request, &mut buf[..width])?;
        if n != width {
            return Err(CodecError::Width {
                expected: width,
                actual: n,
            }
            .into());
        }
        Ok(codec::decode(kind, &buf[..width])?)
    }

    fn flush<S>(&mut self, report: &CycleReport, sink: &mut S)
    where
        S: EventSink + ?Sized,
    {
        let peer = self.address;
        for outcome in &report.outcomes {
            let Some(binding) = self.bindings.get_mut(outcome.id.0) else {
                continue;
            };
            let id = outcome.id;
            let key = outcome.key;
            match (binding, outcome.result) {
                (Binding::Sensor(sensor), Ok(reading)) => {
                    if let Some(restart) = sensor.accept(reading) {
                        warn!(
                            "Poller '{}': '{}' went from {} to {}, peer restarted",
                            self.name, sensor.name, restart.previous, restart.current
                        );
                        sink.emit(&RegistryEvent::PeerRestarted {
                            peer,
                            id,
                            previous: restart.previous,
                            current: restart.current,
                        });
                    }
                    sink.emit(&RegistryEvent::SensorUpdated {
                        peer,
                        id,
                        key,
                        reading,
                    });
                }
                (Binding::Sensor(sensor), Err(error)) => {
                    if sensor.reject(error) {
                        warn!("Poller '{}': '{}' stale: {}", self.name, sensor.name, error);
                        sink.emit(&RegistryEvent::SensorStale {
                            peer,
                            id,
                            key,
                            error,
                        });
                    }
                }
                (Binding::Switch(switch), Ok(Reading::State(on))) => {
                    if let Some(pending) = switch.pending_state() {
                        if pending != on {
                            debug!(
                                "Poller '{}': '{}' read {} while {} pending",
                                self.name, switch.name, on, pending
                            );
                        }
                    }
                    switch.confirm(on);
                    sink.emit(&RegistryEvent::SwitchConfirmed { peer, id, key, on });
                }
                (Binding::Switch(switch), result) => {
                    let error = match result {
                        Err(e) => e,
                        Ok(_) => TransactionError::Malformed(CodecError::KindMismatch),
                    };
                    if switch.reject(error) {
                        warn!("Poller '{}': '{}' stale: {}", self.name, switch.name, error);
                        sink.emit(&RegistryEvent::SwitchStale {
                            peer,
                            id,
                            key,
                            error,
                        });
                    }
                }
            }
        }
    }
}

impl Pollable for ClientRegistryPoller {
    fn label(&self) -> &str {
        &self.name
    }

    fn update_interval_ms(&self) -> u32 {
        self.poll_interval_ms
    }
}

impl BusAddressed for ClientRegistryPoller {
    fn bus_address(&self) -> BusAddress {
        self.address
    }
}
