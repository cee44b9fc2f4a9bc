//! Switch control sub-protocol.
//!
//! Two mutually exclusive key layouts exist for a switch:
//!
//! ```text
//!  command-pair   key_turn_on ──▶ on      (idempotent)
//!                 key_turn_off ─▶ off     (idempotent)
//!                 key_read_state ◀── 0/1
//!
//!  toggle         key_toggle ───▶ flip    (NOT idempotent)
//!                 key_state ◀──── 0/1
//! ```
//!
//! A switch instance picks one layout at configuration time.  The
//! difference in idempotence matters to the retry policy: a lost ACK on a
//! command key can be retried safely, a lost ACK on a toggle key cannot.

use serde::{Deserialize, Serialize};

use super::RegistryKey;
use crate::error::{ConfigError, SwitchError};

/// What a consumer asks a remote switch to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchCommand {
    TurnOn,
    TurnOff,
    Toggle,
}

impl SwitchCommand {
    /// State the switch should end up in, given the state it is expected
    /// to be in now.
    pub fn target(self, expected: Option<bool>) -> Option<bool> {
        match self {
            Self::TurnOn => Some(true),
            Self::TurnOff => Some(false),
            Self::Toggle => expected.map(|on| !on),
        }
    }
}

/// Operation bound to an action key on the slave side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOp {
    TurnOn,
    TurnOff,
    Toggle,
}

impl SwitchOp {
    /// Resulting state after applying this op to `current`.
    pub const fn apply(self, current: bool) -> bool {
        match self {
            Self::TurnOn => true,
            Self::TurnOff => false,
            Self::Toggle => !current,
        }
    }
}

/// Raw switch keys as they appear in configuration.  Exactly one complete
/// form must be present; [`SwitchProtocol::from_keys`] enforces it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchKeys {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_turn_on: Option<RegistryKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_turn_off: Option<RegistryKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_read_state: Option<RegistryKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_toggle: Option<RegistryKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_state: Option<RegistryKey>,
}

/// Resolved key layout of one switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchProtocol {
    CommandPair {
        turn_on: RegistryKey,
        turn_off: RegistryKey,
        read_state: RegistryKey,
    },
    Toggle {
        toggle: RegistryKey,
        state: RegistryKey,
    },
}

impl SwitchProtocol {
    pub fn from_keys(keys: &SwitchKeys) -> Result<Self, ConfigError> {
        let pair = [keys.key_turn_on, keys.key_turn_off, keys.key_read_state];
        let toggle = [keys.key_toggle, keys.key_state];

        let any_pair = pair.iter().any(Option::is_some);
        let any_toggle = toggle.iter().any(Option::is_some);
        if any_pair && any_toggle {
            return Err(ConfigError::MixedSwitchForms);
        }

        match (keys.key_turn_on, keys.key_turn_off, keys.key_read_state) {
            (Some(turn_on), Some(turn_off), Some(read_state)) => {
                return Ok(Self::CommandPair {
                    turn_on,
                    turn_off,
                    read_state,
                });
            }
            _ if any_pair => return Err(ConfigError::IncompleteSwitch),
            _ => {}
        }

        match (keys.key_toggle, keys.key_state) {
            (Some(toggle), Some(state)) => Ok(Self::Toggle { toggle, state }),
            _ => Err(ConfigError::IncompleteSwitch),
        }
    }

    /// Key read to confirm the switch state.
    pub const fn state_key(&self) -> RegistryKey {
        match *self {
            Self::CommandPair { read_state, .. } => read_state,
            Self::Toggle { state, .. } => state,
        }
    }

    /// Write-only keys together with the op each one triggers.
    pub fn action_keys(&self) -> heapless::Vec<(RegistryKey, SwitchOp), 2> {
        let mut out = heapless::Vec::new();
        match *self {
            Self::CommandPair {
                turn_on, turn_off, ..
            } => {
                let _ = out.push((turn_on, SwitchOp::TurnOn));
                let _ = out.push((turn_off, SwitchOp::TurnOff));
            }
            Self::Toggle { toggle, .. } => {
                let _ = out.push((toggle, SwitchOp::Toggle));
            }
        }
        out
    }

    /// Every key this switch occupies, state key first.
    pub fn keys(&self) -> heapless::Vec<RegistryKey, 3> {
        let mut out = heapless::Vec::new();
        let _ = out.push(self.state_key());
        for (key, _) in self.action_keys() {
            let _ = out.push(key);
        }
        out
    }

    /// Whether repeating an action write is harmless.
    pub const fn is_idempotent(&self) -> bool {
        matches!(self, Self::CommandPair { .. })
    }

    /// Pick the action key that realises `command`.
    ///
    /// `expected` is the state the switch is believed to be in right now.
    /// `Ok(None)` means the switch is already where the command wants it
    /// and nothing needs to go on the wire.
    pub fn plan(
        &self,
        command: SwitchCommand,
        expected: Option<bool>,
    ) -> Result<Option<RegistryKey>, SwitchError> {
        match (*self, command) {
            (Self::CommandPair { turn_on, .. }, SwitchCommand::TurnOn) => Ok(Some(turn_on)),
            (Self::CommandPair { turn_off, .. }, SwitchCommand::TurnOff) => Ok(Some(turn_off)),
            (
                Self::CommandPair {
                    turn_on, turn_off, ..
                },
                SwitchCommand::Toggle,
            ) => match expected {
                Some(true) => Ok(Some(turn_off)),
                Some(false) => Ok(Some(turn_on)),
                None => Err(SwitchError::StateUnknown),
            },
            (Self::Toggle { toggle, .. }, SwitchCommand::Toggle) => Ok(Some(toggle)),
            (Self::Toggle { toggle, .. }, _) => {
                let want = command.target(expected).unwrap_or_default();
                match expected {
                    Some(current) if current == want => Ok(None),
                    Some(_) => Ok(Some(toggle)),
                    None => Err(SwitchError::StateUnknown),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> SwitchProtocol {
        SwitchProtocol::CommandPair {
            turn_on: RegistryKey(0x20),
            turn_off: RegistryKey(0x22),
            read_state: RegistryKey(0x21),
        }
    }

    fn toggle() -> SwitchProtocol {
        SwitchProtocol::Toggle {
            toggle: RegistryKey(0x30),
            state: RegistryKey(0x31),
        }
    }

    #[test]
    fn complete_command_pair_resolves() {
        let keys = SwitchKeys {
            key_turn_on: Some(RegistryKey(0x20)),
            key_turn_off: Some(RegistryKey(0x22)),
            key_read_state: Some(RegistryKey(0x21)),
            ..SwitchKeys::default()
        };
        assert_eq!(SwitchProtocol::from_keys(&keys), Ok(pair()));
    }

    #[test]
    fn mixed_forms_are_rejected() {
        let keys = SwitchKeys {
            key_turn_on: Some(RegistryKey(0x20)),
            key_turn_off: Some(RegistryKey(0x22)),
            key_read_state: Some(RegistryKey(0x21)),
            key_toggle: Some(RegistryKey(0x30)),
            ..SwitchKeys::default()
        };
        assert_eq!(
            SwitchProtocol::from_keys(&keys),
            Err(ConfigError::MixedSwitchForms)
        );
    }

    #[test]
    fn partial_forms_are_rejected() {
        let keys = SwitchKeys {
            key_turn_on: Some(RegistryKey(0x20)),
            ..SwitchKeys::default()
        };
        assert_eq!(
            SwitchProtocol::from_keys(&keys),
            Err(ConfigError::IncompleteSwitch)
        );
        assert_eq!(
            SwitchProtocol::from_keys(&SwitchKeys::default()),
            Err(ConfigError::IncompleteSwitch)
        );
    }

    #[test]
    fn only_command_pair_is_idempotent() {
        assert!(pair().is_idempotent());
        assert!(!toggle().is_idempotent());
    }

    #[test]
    fn command_pair_plans_direct_keys() {
        let p = pair();
        assert_eq!(p.plan(SwitchCommand::TurnOn, None), Ok(Some(RegistryKey(0x20))));
        assert_eq!(p.plan(SwitchCommand::TurnOff, Some(false)), Ok(Some(RegistryKey(0x22))));
        assert_eq!(p.plan(SwitchCommand::Toggle, Some(true)), Ok(Some(RegistryKey(0x22))));
        assert_eq!(p.plan(SwitchCommand::Toggle, None), Err(SwitchError::StateUnknown));
    }

    #[test]
    fn toggle_form_skips_redundant_writes() {
        let t = toggle();
        assert_eq!(t.plan(SwitchCommand::Toggle, None), Ok(Some(RegistryKey(0x30))));
        assert_eq!(t.plan(SwitchCommand::TurnOn, Some(true)), Ok(None));
        assert_eq!(t.plan(SwitchCommand::TurnOn, Some(false)), Ok(Some(RegistryKey(0x30))));
        assert_eq!(t.plan(SwitchCommand::TurnOff, None), Err(SwitchError::StateUnknown));
    }

    #[test]
    fn ops_apply_to_state() {
        assert!(SwitchOp::TurnOn.apply(true));
        assert!(!SwitchOp::TurnOff.apply(true));
        assert!(SwitchOp::Toggle.apply(false));
        assert!(!SwitchOp::Toggle.apply(SwitchOp::Toggle.apply(false)));
    }

    #[test]
    fn keys_lists_state_key_first() {
        let keys = pair().keys();
        assert_eq!(
            keys.as_slice(),
            &[RegistryKey(0x21), RegistryKey(0x20), RegistryKey(0x22)]
        );
        assert_eq!(toggle().keys().len(), 2);
    }
}
