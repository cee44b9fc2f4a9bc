//! Registry-key wire protocol shared by the poller and the service.
//!
//! One bus peer hosts many logical endpoints.  Each endpoint is reached
//! through a registry key sent as the "register" of an ordinary I²C
//! register access:
//!
//! ```text
//!  read   master: [addr+W][key ...] [addr+R] ◀── [payload N bytes]
//!  write  master: [addr+W][key ...][payload N bytes]
//! ```
//!
//! Keys are 1 byte (8-bit width) or 2 bytes big-endian (16-bit width).
//! The payload width N is never on the wire; both sides derive it from
//! the [`DecodeKind`](codec::DecodeKind) the key was configured with.

pub mod codec;
pub mod switch;

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FrameError;

pub use codec::{DecodeKind, MAX_PAYLOAD, Payload, Reading};
pub use switch::{SwitchCommand, SwitchKeys, SwitchOp, SwitchProtocol};

/// Longest frame on the wire: 16-bit key plus the widest payload.
pub const MAX_FRAME: usize = 2 + MAX_PAYLOAD;

/// Raw frame buffer.
pub type Frame = heapless::Vec<u8, MAX_FRAME>;

// ---------------------------------------------------------------------------
// Bus address
// ---------------------------------------------------------------------------

/// 7-bit physical address of a bus peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BusAddress(u8);

impl BusAddress {
    /// Returns `None` for anything wider than 7 bits.
    pub const fn new(raw: u8) -> Option<Self> {
        if raw > 0x7F { None } else { Some(Self(raw)) }
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for BusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Registry key
// ---------------------------------------------------------------------------

/// Fixed-width key naming one logical endpoint on a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistryKey(pub u16);

impl RegistryKey {
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 <= 0xFF {
            write!(f, "0x{:02X}", self.0)
        } else {
            write!(f, "0x{:04X}", self.0)
        }
    }
}

/// On-wire width of registry keys for one peer / register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KeyWidth {
    /// Device-scoped keys, one byte.
    #[default]
    #[serde(rename = "8bit")]
    Bits8,
    /// Service-scoped keys, two bytes big-endian.
    #[serde(rename = "16bit")]
    Bits16,
}

impl KeyWidth {
    /// Number of key bytes on the wire.
    pub const fn len(self) -> usize {
        match self {
            Self::Bits8 => 1,
            Self::Bits16 => 2,
        }
    }

    pub const fn fits(self, key: RegistryKey) -> bool {
        match self {
            Self::Bits8 => key.0 <= 0xFF,
            Self::Bits16 => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// Frame the master sends to request a read of `key`.
pub fn read_request(key: RegistryKey, width: KeyWidth) -> Result<Frame, FrameError> {
    let mut frame = Frame::new();
    push_key(&mut frame, key, width)?;
    Ok(frame)
}

/// Frame the master sends to write `payload` to `key`.
pub fn write_request(
    key: RegistryKey,
    width: KeyWidth,
    payload: &[u8],
) -> Result<Frame, FrameError> {
    let mut frame = Frame::new();
    push_key(&mut frame, key, width)?;
    // Payloads come from the codec and never exceed MAX_PAYLOAD.
    let _ = frame.extend_from_slice(&payload[..payload.len().min(MAX_PAYLOAD)]);
    Ok(frame)
}

fn push_key(frame: &mut Frame, key: RegistryKey, width: KeyWidth) -> Result<(), FrameError> {
    if !width.fits(key) {
        return Err(FrameError::KeyOutOfRange(key.0));
    }
    let bytes = key.0.to_be_bytes();
    let _ = match width {
        KeyWidth::Bits8 => frame.push(bytes[1]).map_err(|_| ()),
        KeyWidth::Bits16 => frame.extend_from_slice(&bytes),
    };
    Ok(())
}

/// Split an incoming frame into its key and the (possibly empty) payload.
pub fn parse_frame(frame: &[u8], width: KeyWidth) -> Result<(RegistryKey, &[u8]), FrameError> {
    let n = width.len();
    if frame.len() < n {
        return Err(FrameError::Truncated);
    }
    let key = match width {
        KeyWidth::Bits8 => u16::from(frame[0]),
        KeyWidth::Bits16 => u16::from_be_bytes([frame[0], frame[1]]),
    };
    Ok((RegistryKey(key), &frame[n..]))
}
