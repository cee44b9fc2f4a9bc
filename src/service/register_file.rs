//! Slave-side register file: registry key → typed value slot.
//!
//! ```text
//!  key ──▶ Slot { endpoint, kind, direction, value }
//!
//!  direction   bus read        bus write              local store
//!  Telemetry   value / Empty   ReadOnly               yes
//!  Action      WriteOnly       WriteEffect::Command   no
//!  ReadWrite   value / Empty   WriteEffect::Stored    yes
//! ```
//!
//! The file never calls into local endpoints itself.  A write to an
//! action key comes back as [`WriteEffect::Command`] and the owning
//! service drives the switch, so a rejected write can never have touched
//! anything.

use log::debug;

use crate::error::{CodecError, ConfigError, RegisterError};
use crate::protocol::codec;
use crate::protocol::{DecodeKind, KeyWidth, Payload, Reading, RegistryKey, SwitchOp, parse_frame};

/// Capacity of one register file.
pub const MAX_REGISTERS: usize = 32;

/// Access direction of a slot as seen from the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Read-only telemetry (sensor values, switch state).
    Telemetry,
    /// Write-triggered action (switch commands).
    Action,
    /// Read/write value (calibration and similar).
    ReadWrite,
}

/// What a slot is bound to.  Indices refer to the owning service's
/// endpoint tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Sensor { source: usize },
    SwitchState { switch: usize },
    SwitchAction { switch: usize, op: SwitchOp },
    Value,
}

/// Side effect of an accepted bus write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteEffect {
    /// Drive local switch `switch` with `op`.
    Command { switch: usize, op: SwitchOp },
    /// The payload was stored in a read/write slot.
    Stored,
}

/// Where the first frame ends in bytes the master wrote back to back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameBoundary {
    /// The first `n` bytes are one frame.
    Complete(usize),
    /// The frame is not all here yet.
    Partial,
    /// The head names no bound key; nothing after it can be framed.
    Unknown,
}

#[derive(Debug, Clone)]
struct Slot {
    key: RegistryKey,
    endpoint: Endpoint,
    kind: DecodeKind,
    direction: Direction,
    value: Option<Payload>,
}

/// Read-only view of one slot, for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct SlotInfo {
    pub key: RegistryKey,
    pub endpoint: Endpoint,
    pub kind: DecodeKind,
    pub direction: Direction,
    pub populated: bool,
}

pub struct RegisterFile {
    width: KeyWidth,
    slots: heapless::Vec<Slot, MAX_REGISTERS>,
}

impl RegisterFile {
    pub fn new(width: KeyWidth) -> Self {
        Self {
            width,
            slots: heapless::Vec::new(),
        }
    }

    pub fn key_width(&self) -> KeyWidth {
        self.width
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Bind `key`.  Every error is a configuration-time failure.
    ///
    /// Action slots must use [`DecodeKind::Trigger`]; no other direction
    /// may.
    pub fn bind(
        &mut self,
        key: RegistryKey,
        endpoint: Endpoint,
        kind: DecodeKind,
        direction: Direction,
    ) -> Result<(), ConfigError> {
        if !self.width.fits(key) {
            return Err(ConfigError::KeyOutOfRange(key.get()));
        }
        if self.position(key).is_some() {
            return Err(ConfigError::DuplicateKey(key.get()));
        }
        let is_action = matches!(direction, Direction::Action);
        if is_action != matches!(kind, DecodeKind::Trigger) {
            return Err(ConfigError::InvalidKind(key.get()));
        }

        self.slots
            .push(Slot {
                key,
                endpoint,
                kind,
                direction,
                value: None,
            })
            .map_err(|_| ConfigError::TooManyBindings)
    }

    /// Payload the bus master receives for `key`.
    pub fn read(&self, key: RegistryKey) -> Result<Payload, RegisterError> {
        let slot = self.slot(key)?;
        if slot.direction == Direction::Action {
            return Err(RegisterError::WriteOnly);
        }
        slot.value.clone().ok_or(RegisterError::Empty)
    }

    /// Apply a bus write.  Nothing is mutated unless `Ok` is returned.
    pub fn write(&mut self, key: RegistryKey, payload: &[u8]) -> Result<WriteEffect, RegisterError> {
        let idx = self.position(key).ok_or(RegisterError::UnknownKey)?;
        let slot = &mut self.slots[idx];

        match (slot.direction, slot.endpoint) {
            (Direction::Telemetry, _) => Err(RegisterError::ReadOnly),
            (Direction::Action, Endpoint::SwitchAction { switch, op }) => {
                if payload.len() != slot.kind.width() {
                    return Err(codec_width(slot.kind, payload).into());
                }
                Ok(WriteEffect::Command { switch, op })
            }
            (Direction::Action, _) => Err(RegisterError::ReadOnly),
            (Direction::ReadWrite, _) => {
                // Validate before storing; malformed payloads never land.
                codec::decode(slot.kind, payload)?;
                let mut stored = Payload::new();
                let _ = stored.extend_from_slice(payload);
                debug!("RegisterFile: {} <- {:02X?}", key, payload);
                slot.value = Some(stored);
                Ok(WriteEffect::Stored)
            }
        }
    }

    /// Store a locally sampled value.  Bypasses the direction check for
    /// telemetry (that is how telemetry gets its value) but not for
    /// action keys, which hold nothing.
    pub fn store(&mut self, key: RegistryKey, reading: Reading) -> Result<(), RegisterError> {
        let idx = self.position(key).ok_or(RegisterError::UnknownKey)?;
        let slot = &mut self.slots[idx];
        if slot.direction == Direction::Action {
            return Err(RegisterError::WriteOnly);
        }
        slot.value = Some(codec::encode(slot.kind, reading)?);
        Ok(())
    }

    /// Decoded current value of `key`, if it has one.
    pub fn get(&self, key: RegistryKey) -> Option<Reading> {
        let slot = self.slot(key).ok()?;
        let payload = slot.value.as_ref()?;
        codec::decode(slot.kind, payload).ok()
    }

    /// Frame the head of `stream` using the bound slot's direction and
    /// width.  Telemetry keys are only ever read, action keys only ever
    /// written.  A read/write key is a write once its whole payload is
    /// buffered and a read when nothing follows the key.
    pub fn frame_boundary(&self, stream: &[u8]) -> FrameBoundary {
        let Ok((key, rest)) = parse_frame(stream, self.width) else {
            return FrameBoundary::Partial;
        };
        let Ok(slot) = self.slot(key) else {
            return FrameBoundary::Unknown;
        };
        let head = self.width.len();
        let payload = slot.kind.width();
        match slot.direction {
            Direction::Telemetry => FrameBoundary::Complete(head),
            Direction::Action | Direction::ReadWrite if rest.len() >= payload => {
                FrameBoundary::Complete(head + payload)
            }
            Direction::ReadWrite if rest.is_empty() => FrameBoundary::Complete(head),
            _ => FrameBoundary::Partial,
        }
    }

    /// Every bound slot, in bind order.
    pub fn slots(&self) -> impl Iterator<Item = SlotInfo> + '_ {
        self.slots.iter().map(|s| SlotInfo {
            key: s.key,
            endpoint: s.endpoint,
            kind: s.kind,
            direction: s.direction,
            populated: s.value.is_some(),
        })
    }

    fn position(&self, key: RegistryKey) -> Option<usize> {
        self.slots.iter().position(|s| s.key == key)
    }

    fn slot(&self, key: RegistryKey) -> Result<&Slot, RegisterError> {
        self.slots
            .iter()
            .find(|s| s.key == key)
            .ok_or(RegisterError::UnknownKey)
    }
}

fn codec_width(kind: DecodeKind, payload: &[u8]) -> CodecError {
    CodecError::Width {
        expected: kind.width(),
        actual: payload.len(),
    }
}
