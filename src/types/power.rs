// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Power-related types.
//!
//! [`PowerAction`] is what callers ask for; [`OutletState`] is what the
//! state store knows about an output, which may also be `unknown` until a
//! PDU has been polled.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// A requested power transition.
///
/// # Examples
///
/// ```
/// use powerseq::types::PowerAction;
///
/// let action: PowerAction = "on".parse().unwrap();
/// assert_eq!(action, PowerAction::On);
/// assert_eq!(action.inverse(), PowerAction::Off);
/// assert_eq!(action.as_str(), "on");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerAction {
    /// Switch the output on.
    On,
    /// Switch the output off.
    Off,
}

impl PowerAction {
    /// Returns the lowercase wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
        }
    }

    /// Returns the opposite action.
    #[must_use]
    pub const fn inverse(&self) -> Self {
        match self {
            Self::On => Self::Off,
            Self::Off => Self::On,
        }
    }

    /// Returns true for [`PowerAction::On`].
    #[must_use]
    pub const fn is_on(&self) -> bool {
        matches!(self, Self::On)
    }
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PowerAction {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "on" | "1" | "true" => Ok(Self::On),
            "off" | "0" | "false" => Ok(Self::Off),
            _ => Err(ValueError::InvalidPowerAction(s.to_string())),
        }
    }
}

impl From<bool> for PowerAction {
    fn from(value: bool) -> Self {
        if value { Self::On } else { Self::Off }
    }
}

/// Last known state of an outlet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutletState {
    /// The outlet is powered.
    On,
    /// The outlet is not powered.
    Off,
    /// The state has not been read yet or the device reported something else.
    #[default]
    Unknown,
}

impl OutletState {
    /// Returns the lowercase wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Unknown => "unknown",
        }
    }

    /// Returns true only for [`OutletState::On`].
    #[must_use]
    pub const fn is_on(&self) -> bool {
        matches!(self, Self::On)
    }
}

impl fmt::Display for OutletState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutletState {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "on" => Ok(Self::On),
            "off" => Ok(Self::Off),
            "unknown" => Ok(Self::Unknown),
            _ => Err(ValueError::InvalidOutletState(s.to_string())),
        }
    }
}

impl From<PowerAction> for OutletState {
    fn from(action: PowerAction) -> Self {
        match action {
            PowerAction::On => Self::On,
            PowerAction::Off => Self::Off,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_action_from_str() {
        assert_eq!("ON".parse::<PowerAction>().unwrap(), PowerAction::On);
        assert_eq!("off".parse::<PowerAction>().unwrap(), PowerAction::Off);
        assert_eq!("1".parse::<PowerAction>().unwrap(), PowerAction::On);
        assert_eq!("false".parse::<PowerAction>().unwrap(), PowerAction::Off);
    }

    #[test]
    fn power_action_from_str_invalid() {
        let result = "toggle".parse::<PowerAction>();
        assert!(matches!(
            result.unwrap_err(),
            ValueError::InvalidPowerAction(_)
        ));
    }

    #[test]
    fn power_action_inverse() {
        assert_eq!(PowerAction::On.inverse(), PowerAction::Off);
        assert_eq!(PowerAction::Off.inverse(), PowerAction::On);
    }

    #[test]
    fn power_action_serde_is_lowercase() {
        let json = serde_json::to_string(&PowerAction::On).unwrap();
        assert_eq!(json, "\"on\"");
        let action: PowerAction = serde_json::from_str("\"off\"").unwrap();
        assert_eq!(action, PowerAction::Off);
    }

    #[test]
    fn outlet_state_defaults_to_unknown() {
        assert_eq!(OutletState::default(), OutletState::Unknown);
        assert!(!OutletState::Unknown.is_on());
    }

    #[test]
    fn outlet_state_from_action() {
        assert_eq!(OutletState::from(PowerAction::On), OutletState::On);
        assert_eq!(OutletState::from(PowerAction::Off), OutletState::Off);
    }
}
