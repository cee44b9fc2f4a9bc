//! Unified error types for the registry protocol.
//!
//! Runtime bus failures ([`BusError`], [`TransactionError`]) are absorbed
//! by the poller and the service: they demote a binding to stale or turn
//! into a NACK, never into a hard fault.  Only [`ConfigError`] is fatal,
//! and only before anything starts talking on the bus.
//!
//! All variants are `Copy` so they can be stored per binding and passed
//! through the poll cycle without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A bus transaction failed.
    Bus(BusError),
    /// A payload did not match its decode kind.
    Codec(CodecError),
    /// A raw frame could not be parsed.
    Frame(FrameError),
    /// A register file access was rejected.
    Register(RegisterError),
    /// A switch request could not be issued.
    Switch(SwitchError),
    /// Configuration is invalid.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Codec(e) => write!(f, "codec: {e}"),
            Self::Frame(e) => write!(f, "frame: {e}"),
            Self::Register(e) => write!(f, "register: {e}"),
            Self::Switch(e) => write!(f, "switch: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Bus errors
// ---------------------------------------------------------------------------

/// Outcome of a failed transaction as reported by the bus transport.
///
/// An unknown registry key on the peer and a flaky wire both surface as
/// [`BusError::NotAcknowledged`]; the protocol cannot tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The addressed peer (or the key it was asked for) did not ACK.
    NotAcknowledged,
    /// The transaction did not complete within the transport's timeout.
    Timeout,
    /// Another master won arbitration.
    ArbitrationLost,
    /// The transfer exceeds what the transport can buffer.
    TooLarge,
    /// Miscellaneous bus error.
    Bus,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAcknowledged => write!(f, "not acknowledged"),
            Self::Timeout => write!(f, "timeout"),
            Self::ArbitrationLost => write!(f, "arbitration lost"),
            Self::TooLarge => write!(f, "transfer too large"),
            Self::Bus => write!(f, "bus error"),
        }
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

// ---------------------------------------------------------------------------
// Codec errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Payload length differs from the width implied by the decode kind.
    Width { expected: usize, actual: usize },
    /// The reading's variant cannot be encoded with this decode kind.
    KindMismatch,
    /// A state payload held something other than 0x00 / 0x01.
    InvalidState(u8),
    /// A float payload decoded to NaN or infinity.
    NotFinite,
    /// Trigger keys carry no readable value.
    NotReadable,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Width { expected, actual } => {
                write!(f, "payload width {actual}, expected {expected}")
            }
            Self::KindMismatch => write!(f, "reading does not match decode kind"),
            Self::InvalidState(b) => write!(f, "invalid state byte 0x{b:02X}"),
            Self::NotFinite => write!(f, "non-finite measurement"),
            Self::NotReadable => write!(f, "trigger key is not readable"),
        }
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Self::Codec(e)
    }
}

// ---------------------------------------------------------------------------
// Frame errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer bytes than the key width.
    Truncated,
    /// Key does not fit the configured key width.
    KeyOutOfRange(u16),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "frame shorter than key width"),
            Self::KeyOutOfRange(k) => write!(f, "key 0x{k:04X} exceeds key width"),
        }
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

// ---------------------------------------------------------------------------
// Register file errors
// ---------------------------------------------------------------------------

/// Rejections from [`RegisterFile`](crate::service::RegisterFile).
/// The service answers every one of them with a NACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    /// Nothing is bound to this key.
    UnknownKey,
    /// Telemetry keys reject bus writes.
    ReadOnly,
    /// Action keys cannot be read.
    WriteOnly,
    /// The slot has never been sampled.
    Empty,
    /// The write payload does not match the slot's decode kind.
    Codec(CodecError),
}

impl fmt::Display for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKey => write!(f, "unknown key"),
            Self::ReadOnly => write!(f, "key is read-only"),
            Self::WriteOnly => write!(f, "key is write-only"),
            Self::Empty => write!(f, "no value sampled yet"),
            Self::Codec(e) => write!(f, "{e}"),
        }
    }
}

impl From<CodecError> for RegisterError {
    fn from(e: CodecError) -> Self {
        Self::Codec(e)
    }
}

impl From<RegisterError> for Error {
    fn from(e: RegisterError) -> Self {
        Self::Register(e)
    }
}

// ---------------------------------------------------------------------------
// Per-key poll outcome
// ---------------------------------------------------------------------------

/// Why a single key failed during a poll cycle.  Both variants are
/// handled identically: last value kept, binding marked stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionError {
    Bus(BusError),
    Malformed(CodecError),
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "{e}"),
            Self::Malformed(e) => write!(f, "malformed payload: {e}"),
        }
    }
}

impl From<BusError> for TransactionError {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

impl From<CodecError> for TransactionError {
    fn from(e: CodecError) -> Self {
        Self::Malformed(e)
    }
}

// ---------------------------------------------------------------------------
// Switch errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchError {
    /// The endpoint id does not refer to a switch binding.
    NotASwitch,
    /// The command depends on the current state, which has never been
    /// confirmed.
    StateUnknown,
    /// All write attempts failed.
    Bus(BusError),
}

impl fmt::Display for SwitchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotASwitch => write!(f, "endpoint is not a switch"),
            Self::StateUnknown => write!(f, "switch state not yet confirmed"),
            Self::Bus(e) => write!(f, "write failed: {e}"),
        }
    }
}

impl From<BusError> for SwitchError {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

impl From<SwitchError> for Error {
    fn from(e: SwitchError) -> Self {
        Self::Switch(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Configuration contract violations.  Always fatal: the poller or
/// service that hit one is never constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Bus address is not a 7-bit value.
    InvalidAddress(u8),
    /// Key does not fit the configured key width.
    KeyOutOfRange(u16),
    /// Key is bound more than once on the same peer or register file.
    DuplicateKey(u16),
    /// An endpoint name is used twice on the same peer or register file;
    /// carries a key of the second endpoint.
    DuplicateName(u16),
    /// A switch names keys from both the command-pair and toggle forms.
    MixedSwitchForms,
    /// A switch names neither a complete command-pair nor toggle form.
    IncompleteSwitch,
    /// Decode kind is not valid for the endpoint bound at this key.
    InvalidKind(u16),
    /// Poll or update interval of zero.
    ZeroInterval,
    /// More endpoints than the fixed-capacity tables hold.
    TooManyBindings,
    /// The local endpoint for the binding at this key was not supplied
    /// (or has the wrong type).
    UnresolvedEndpoint(u16),
    /// The configuration document is not valid JSON for the schema.
    Malformed { line: usize, column: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAddress(a) => write!(f, "bus address 0x{a:02X} is not 7-bit"),
            Self::KeyOutOfRange(k) => write!(f, "key 0x{k:04X} exceeds key width"),
            Self::DuplicateKey(k) => write!(f, "key 0x{k:04X} bound more than once"),
            Self::DuplicateName(k) => {
                write!(f, "endpoint at key 0x{k:04X} reuses an earlier name")
            }
            Self::MixedSwitchForms => {
                write!(f, "switch mixes command-pair and toggle keys")
            }
            Self::IncompleteSwitch => write!(f, "switch keys incomplete"),
            Self::InvalidKind(k) => write!(f, "decode kind not valid for key 0x{k:04X}"),
            Self::ZeroInterval => write!(f, "interval must be non-zero"),
            Self::TooManyBindings => write!(f, "too many bindings"),
            Self::UnresolvedEndpoint(k) => {
                write!(f, "no local endpoint for key 0x{k:04X}")
            }
            Self::Malformed { line, column } => {
                write!(f, "malformed config at {line}:{column}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
