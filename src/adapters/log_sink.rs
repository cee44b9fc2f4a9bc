//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing registry events to the logger
//! (UART / USB-CDC in production).  A host-framework adapter would
//! implement the same trait and publish to its entities instead.

use log::{info, warn};

use crate::app::events::RegistryEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`RegistryEvent`] to the serial console.
/// Routine updates go out at `info`, transitions into stale at `warn`.
#[derive(Default)]
pub struct LogEventSink {
    /// Also log successful cycle completions (noisy at short intervals).
    pub verbose_cycles: bool,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self {
            verbose_cycles: false,
        }
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &RegistryEvent) {
        match *event {
            RegistryEvent::SensorUpdated {
                peer,
                id,
                key,
                reading,
            } => {
                info!("SENSOR | {} {} key={} value={:?}", peer, id, key, reading);
            }
            RegistryEvent::SensorStale {
                peer,
                id,
                key,
                error,
            } => {
                warn!("STALE  | {} {} key={} ({})", peer, id, key, error);
            }
            RegistryEvent::SwitchConfirmed { peer, id, key, on } => {
                info!(
                    "SWITCH | {} {} key={} state={}",
                    peer,
                    id,
                    key,
                    if on { "ON" } else { "OFF" }
                );
            }
            RegistryEvent::SwitchStale {
                peer,
                id,
                key,
                error,
            } => {
                warn!("STALE  | {} {} switch key={} ({})", peer, id, key, error);
            }
            RegistryEvent::PeerRestarted {
                peer,
                id,
                previous,
                current,
            } => {
                warn!(
                    "RESTART| {} {} uptime {}s -> {}s",
                    peer, id, previous, current
                );
            }
            RegistryEvent::CycleCompleted {
                peer,
                outcome,
                failed,
            } => {
                if failed > 0 || self.verbose_cycles {
                    info!("CYCLE  | {} {:?} failed={}", peer, outcome, failed);
                }
            }
        }
    }
}
