//! One scheduled poll of one peer.
//!
//! A [`PollCycle`] is built from the binding table, visited key by key in
//! configuration order, and consumed at the end of the cycle.  Outcomes
//! are accumulated first and only applied to the bindings when the cycle
//! is flushed, so a consumer never observes a half-updated table.

use super::binding::{Binding, EndpointId};
use super::MAX_BINDINGS;
use crate::error::TransactionError;
use crate::protocol::{DecodeKind, Reading, RegistryKey};

/// Poller state machine.
///
/// ```text
///   Idle ──tick──▶ Polling ──▶ Success ─┐
///     ▲                    └─▶ Failed  ─┤
///     └─────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Polling,
    Success,
    Failed,
}

/// How a finished cycle went.  `Failed` means at least one key failed;
/// the remaining keys were still visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Success,
    Failed,
}

/// Result of visiting one key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyOutcome {
    pub id: EndpointId,
    pub key: RegistryKey,
    pub result: Result<Reading, TransactionError>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Visit {
    pub(crate) id: EndpointId,
    pub(crate) key: RegistryKey,
    pub(crate) kind: DecodeKind,
}

/// Ephemeral state of one poll tick.
pub(crate) struct PollCycle {
    visits: heapless::Vec<Visit, MAX_BINDINGS>,
    outcomes: heapless::Vec<KeyOutcome, MAX_BINDINGS>,
}

impl PollCycle {
    /// Plan a cycle over `bindings`, in table order.
    pub(crate) fn plan(bindings: &[Binding]) -> Self {
        let mut visits = heapless::Vec::new();
        for (i, binding) in bindings.iter().enumerate() {
            let (key, kind) = binding.read_key();
            // The table never holds more than MAX_BINDINGS entries.
            let _ = visits.push(Visit {
                id: EndpointId(i),
                key,
                kind,
            });
        }
        Self {
            visits,
            outcomes: heapless::Vec::new(),
        }
    }

    pub(crate) fn visits(&self) -> heapless::Vec<Visit, MAX_BINDINGS> {
        self.visits.clone()
    }

    pub(crate) fn record(&mut self, visit: Visit, result: Result<Reading, TransactionError>) {
        let _ = self.outcomes.push(KeyOutcome {
            id: visit.id,
            key: visit.key,
            result,
        });
    }

    pub(crate) fn into_report(self) -> CycleReport {
        let failed = self.outcomes.iter().filter(|o| o.result.is_err()).count();
        let outcome = if failed == 0 {
            CycleOutcome::Success
        } else {
            CycleOutcome::Failed
        };
        CycleReport {
            outcome,
            outcomes: self.outcomes,
        }
    }
}

/// Everything a finished cycle produced, in visit order.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub outcomes: heapless::Vec<KeyOutcome, MAX_BINDINGS>,
}

impl CycleReport {
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }

    /// Keys in the order they were visited.
    pub fn keys(&self) -> impl Iterator<Item = RegistryKey> + '_ {
        self.outcomes.iter().map(|o| o.key)
    }
}
