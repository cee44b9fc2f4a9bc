//! In-memory bus wiring pollers straight to slave services.
//!
//! Used for host simulation and tests: every transaction is dispatched to
//! the [`SlaveRegistryService`] registered at the target address, exactly
//! as the slave port would deliver it on hardware.  Peers can be taken
//! offline and single transactions can be failed to exercise the poller's
//! partial-failure handling.

use log::trace;

use crate::app::ports::{BusAddressed, BusTransport};
use crate::error::BusError;
use crate::protocol::BusAddress;
use crate::service::{SlaveRegistryService, SlaveResponse};

struct Peer {
    address: BusAddress,
    service: SlaveRegistryService,
    offline: bool,
}

#[derive(Default)]
pub struct LoopbackBus {
    peers: Vec<Peer>,
    inject: Option<BusError>,
    transactions: u32,
}

impl LoopbackBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `service` at its own bus address.  A second service on the
    /// same address replaces the first.
    pub fn attach(&mut self, service: SlaveRegistryService) {
        let address = service.bus_address();
        self.peers.retain(|p| p.address != address);
        self.peers.push(Peer {
            address,
            service,
            offline: false,
        });
    }

    pub fn service(&self, address: BusAddress) -> Option<&SlaveRegistryService> {
        self.peers
            .iter()
            .find(|p| p.address == address)
            .map(|p| &p.service)
    }

    pub fn service_mut(&mut self, address: BusAddress) -> Option<&mut SlaveRegistryService> {
        self.peers
            .iter_mut()
            .find(|p| p.address == address)
            .map(|p| &mut p.service)
    }

    /// An offline peer times out on every transaction.
    pub fn set_offline(&mut self, address: BusAddress, offline: bool) {
        if let Some(p) = self.peers.iter_mut().find(|p| p.address == address) {
            p.offline = offline;
        }
    }

    /// Fail the next transaction, whatever its target, with `error`.
    pub fn fail_next(&mut self, error: BusError) {
        self.inject = Some(error);
    }

    /// Transactions attempted so far, failed ones included.
    pub fn transactions(&self) -> u32 {
        self.transactions
    }

    fn dispatch(&mut self, address: BusAddress, frame: &[u8]) -> Result<SlaveResponse, BusError> {
        self.transactions = self.transactions.wrapping_add(1);
        if let Some(e) = self.inject.take() {
            return Err(e);
        }
        let peer = self
            .peers
            .iter_mut()
            .find(|p| p.address == address)
            .ok_or(BusError::NotAcknowledged)?;
        if peer.offline {
            return Err(BusError::Timeout);
        }
        let response = peer.service.handle_frame(frame);
        trace!("Loopback {}: {:02X?} -> {:?}", address, frame, response);
        Ok(response)
    }
}

impl BusTransport for LoopbackBus {
    fn read(
        &mut self,
        address: BusAddress,
        request: &[u8],
        buf: &mut [u8],
    ) -> Result<usize, BusError> {
        match self.dispatch(address, request)? {
            SlaveResponse::Staged(bytes) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                // Report what the slave supplied, not what fit.
                Ok(bytes.len())
            }
            SlaveResponse::Ack | SlaveResponse::Nack => Err(BusError::NotAcknowledged),
        }
    }

    fn write(&mut self, address: BusAddress, frame: &[u8]) -> Result<(), BusError> {
        match self.dispatch(address, frame)? {
            SlaveResponse::Nack => Err(BusError::NotAcknowledged),
            SlaveResponse::Ack | SlaveResponse::Staged(_) => Ok(()),
        }
    }
}
