//! Payload codec: decode kinds, readings and their fixed-width encodings.
//!
//! ```text
//!  kind              width  encoding
//!  counter             4    u32 LE, seconds
//!  signal_strength     1    i8, dBm
//!  measurement         4    f32 LE
//!  measurement_i16     2    i16 LE
//!  measurement_u16     2    u16 LE
//!  state               1    0x00 off, 0x01 on
//!  trigger             1    write-only, value ignored
//! ```
//!
//! The codec never rescales.  Units belong to whoever consumes the
//! decoded value.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Widest payload any decode kind produces.
pub const MAX_PAYLOAD: usize = 4;

/// Encoded payload buffer.
pub type Payload = heapless::Vec<u8, MAX_PAYLOAD>;

/// How the bytes behind a registry key are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeKind {
    /// Monotonic counter in seconds (uptime).
    Counter,
    /// Link signal strength in dBm.
    SignalStrength,
    /// Generic measurement, f32.
    Measurement,
    /// Generic measurement, i16.
    MeasurementI16,
    /// Generic measurement, u16.
    MeasurementU16,
    /// Switch state.
    State,
    /// Write-only action key.
    Trigger,
}

impl DecodeKind {
    /// Payload width in bytes.
    pub const fn width(self) -> usize {
        match self {
            Self::Counter | Self::Measurement => 4,
            Self::MeasurementI16 | Self::MeasurementU16 => 2,
            Self::SignalStrength | Self::State | Self::Trigger => 1,
        }
    }

    pub const fn is_readable(self) -> bool {
        !matches!(self, Self::Trigger)
    }
}

/// A decoded value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Counter(u32),
    SignalStrength(i8),
    Measurement(f32),
    State(bool),
}

/// Decode a payload received for a key of `kind`.
pub fn decode(kind: DecodeKind, bytes: &[u8]) -> Result<Reading, CodecError> {
    if !kind.is_readable() {
        return Err(CodecError::NotReadable);
    }
    if bytes.len() != kind.width() {
        return Err(CodecError::Width {
            expected: kind.width(),
            actual: bytes.len(),
        });
    }

    let reading = match kind {
        DecodeKind::Counter => {
            Reading::Counter(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        }
        DecodeKind::SignalStrength => Reading::SignalStrength(i8::from_le_bytes([bytes[0]])),
        DecodeKind::Measurement => {
            let v = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            Reading::Measurement(finite(v)?)
        }
        DecodeKind::MeasurementI16 => {
            Reading::Measurement(f32::from(i16::from_le_bytes([bytes[0], bytes[1]])))
        }
        DecodeKind::MeasurementU16 => {
            Reading::Measurement(f32::from(u16::from_le_bytes([bytes[0], bytes[1]])))
        }
        DecodeKind::State => match bytes[0] {
            0x00 => Reading::State(false),
            0x01 => Reading::State(true),
            other => return Err(CodecError::InvalidState(other)),
        },
        DecodeKind::Trigger => return Err(CodecError::NotReadable),
    };
    Ok(reading)
}

/// Encode `reading` for a key of `kind`.
///
/// Integer measurement formats round and saturate.
pub fn encode(kind: DecodeKind, reading: Reading) -> Result<Payload, CodecError> {
    let mut out = Payload::new();
    // Every arm writes at most MAX_PAYLOAD bytes.
    let _ = match (kind, reading) {
        (DecodeKind::Counter, Reading::Counter(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (DecodeKind::SignalStrength, Reading::SignalStrength(v)) => {
            out.extend_from_slice(&v.to_le_bytes())
        }
        (DecodeKind::Measurement, Reading::Measurement(v)) => {
            out.extend_from_slice(&finite(v)?.to_le_bytes())
        }
        (DecodeKind::MeasurementI16, Reading::Measurement(v)) => {
            out.extend_from_slice(&(finite(v)?.round() as i16).to_le_bytes())
        }
        (DecodeKind::MeasurementU16, Reading::Measurement(v)) => {
            out.extend_from_slice(&(finite(v)?.round() as u16).to_le_bytes())
        }
        (DecodeKind::State, Reading::State(on)) => out.extend_from_slice(&[u8::from(on)]),
        _ => return Err(CodecError::KindMismatch),
    };
    Ok(out)
}

fn finite(v: f32) -> Result<f32, CodecError> {
    if v.is_finite() { Ok(v) } else { Err(CodecError::NotFinite) }
}

/// Payload written to a trigger key.
pub fn trigger_payload() -> Payload {
    let mut out = Payload::new();
    let _ = out.push(0x01);
    out
}
