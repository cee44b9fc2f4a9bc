//! Per-endpoint state owned by the poller.
//!
//! A binding keeps the most recent confirmed value and a validity flag.
//! A failed poll never clears the value; it only demotes the flag, so the
//! value is always either the latest confirmed sample or explicitly stale.

use core::fmt;

use crate::error::TransactionError;
use crate::protocol::{DecodeKind, Reading, RegistryKey, SwitchProtocol};

/// Index of a binding in its poller, in configuration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointId(pub(crate) usize);

impl EndpointId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether the held value can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    /// Not polled yet.
    Unknown,
    /// Last poll succeeded.
    Valid,
    /// Last poll failed; the held value (if any) is older.
    Stale,
}

/// Tagged binding table entry.
#[derive(Debug, Clone)]
pub enum Binding {
    Sensor(SensorBinding),
    Switch(SwitchBinding),
}

impl Binding {
    pub fn name(&self) -> &str {
        match self {
            Self::Sensor(s) => &s.name,
            Self::Switch(s) => &s.name,
        }
    }

    /// Key read during a poll cycle, with its decode kind.
    pub fn read_key(&self) -> (RegistryKey, DecodeKind) {
        match self {
            Self::Sensor(s) => (s.key, s.kind),
            Self::Switch(s) => (s.protocol.state_key(), DecodeKind::State),
        }
    }
}

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SensorBinding {
    pub(crate) name: String,
    pub(crate) key: RegistryKey,
    pub(crate) kind: DecodeKind,
    last: Option<Reading>,
    validity: Validity,
    last_error: Option<TransactionError>,
    restarts: u32,
}

/// What a successful sample did to a counter binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Restart {
    pub previous: u32,
    pub current: u32,
}

impl SensorBinding {
    pub fn new(name: &str, key: RegistryKey, kind: DecodeKind) -> Self {
        Self {
            name: name.into(),
            key,
            kind,
            last: None,
            validity: Validity::Unknown,
            last_error: None,
            restarts: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> RegistryKey {
        self.key
    }

    pub fn kind(&self) -> DecodeKind {
        self.kind
    }

    /// Most recent confirmed sample, even if stale.
    pub fn last_known_value(&self) -> Option<Reading> {
        self.last
    }

    pub fn validity(&self) -> Validity {
        self.validity
    }

    pub fn is_stale(&self) -> bool {
        self.validity == Validity::Stale
    }

    pub fn last_error(&self) -> Option<TransactionError> {
        self.last_error
    }

    /// Number of counter decreases seen (peer restarts).
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    /// Accept a decoded sample.  A counter going backwards is a peer
    /// restart: it is counted and becomes the new baseline.
    pub(crate) fn accept(&mut self, reading: Reading) -> Option<Restart> {
        let restart = match (self.last, reading) {
            (Some(Reading::Counter(previous)), Reading::Counter(current)) if current < previous => {
                self.restarts = self.restarts.saturating_add(1);
                Some(Restart { previous, current })
            }
            _ => None,
        };
        self.last = Some(reading);
        self.validity = Validity::Valid;
        self.last_error = None;
        restart
    }

    /// Record a failed poll.  Returns `true` on the transition into stale.
    pub(crate) fn reject(&mut self, error: TransactionError) -> bool {
        self.last_error = Some(error);
        let entered = self.validity != Validity::Stale;
        self.validity = Validity::Stale;
        entered
    }
}

// ---------------------------------------------------------------------------
// Switches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SwitchBinding {
    pub(crate) name: String,
    pub(crate) protocol: SwitchProtocol,
    confirmed: Option<bool>,
    pending: Option<bool>,
    /// A toggle write failed after possibly landing.
    uncertain: bool,
    validity: Validity,
    last_error: Option<TransactionError>,
}

impl SwitchBinding {
    pub fn new(name: &str, protocol: SwitchProtocol) -> Self {
        Self {
            name: name.into(),
            protocol,
            confirmed: None,
            pending: None,
            uncertain: false,
            validity: Validity::Unknown,
            last_error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn protocol(&self) -> SwitchProtocol {
        self.protocol
    }

    /// State last read back from the peer.
    pub fn confirmed_state(&self) -> Option<bool> {
        self.confirmed
    }

    /// Target of a command written but not yet read back.
    pub fn pending_state(&self) -> Option<bool> {
        self.pending
    }

    /// State the switch is believed to be in: the pending target if a
    /// command is in flight, the confirmed state otherwise.  `None` until
    /// the next state read after an unacknowledged toggle.
    pub fn expected_state(&self) -> Option<bool> {
        if self.uncertain {
            return None;
        }
        self.pending.or(self.confirmed)
    }

    /// Whether an unacknowledged toggle is awaiting a state read.
    pub fn is_uncertain(&self) -> bool {
        self.uncertain
    }

    pub fn validity(&self) -> Validity {
        self.validity
    }

    pub fn is_stale(&self) -> bool {
        self.validity == Validity::Stale
    }

    pub fn last_error(&self) -> Option<TransactionError> {
        self.last_error
    }

    pub(crate) fn set_pending(&mut self, target: Option<bool>) {
        self.pending = target;
    }

    pub(crate) fn mark_uncertain(&mut self) {
        self.pending = None;
        self.uncertain = true;
    }

    /// A state read succeeded.  The read is authoritative: any pending
    /// command is settled by it, whichever way it went.
    pub(crate) fn confirm(&mut self, on: bool) {
        self.confirmed = Some(on);
        self.pending = None;
        self.uncertain = false;
        self.validity = Validity::Valid;
        self.last_error = None;
    }

    /// Returns `true` on the transition into stale.
    pub(crate) fn reject(&mut self, error: TransactionError) -> bool {
        self.last_error = Some(error);
        let entered = self.validity != Validity::Stale;
        self.validity = Validity::Stale;
        entered
    }
}
