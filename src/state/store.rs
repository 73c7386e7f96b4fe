// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Live outlet state.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::config::GpioPinConfig;
use crate::types::{OutletState, PowerAction, normalize};

/// One switchable socket on a PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduOutlet {
    /// SNMP index of the outlet (e.g. `"3"`).
    pub index: String,
    /// Outlet name as reported by the PDU.
    pub name: String,
    /// Last known state.
    pub state: OutletState,
}

impl PduOutlet {
    /// Creates an outlet with unknown state.
    #[must_use]
    pub fn new(index: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            name: name.into(),
            state: OutletState::Unknown,
        }
    }

    /// Sets the initial state.
    #[must_use]
    pub fn with_state(mut self, state: OutletState) -> Self {
        self.state = state;
        self
    }
}

/// A discovered power distribution unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PduInfo {
    /// `sysName` of the unit.
    pub sys_name: String,
    /// `sysLocation` of the unit.
    pub sys_location: String,
    /// Model family, e.g. `RPDU` or `RPDU2`.
    pub kind: String,
    /// Outlets in discovery order.
    pub outlets: Vec<PduOutlet>,
}

impl PduInfo {
    /// Creates a PDU description without outlets.
    #[must_use]
    pub fn new(sys_name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            sys_name: sys_name.into(),
            kind: kind.into(),
            ..Self::default()
        }
    }

    /// Sets the location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.sys_location = location.into();
        self
    }

    /// Adds an outlet.
    #[must_use]
    pub fn with_outlet(mut self, outlet: PduOutlet) -> Self {
        self.outlets.push(outlet);
        self
    }

    fn outlet_mut(&mut self, index: &str) -> Option<&mut PduOutlet> {
        self.outlets.iter_mut().find(|o| o.index == index)
    }
}

/// A relay output on a (possibly remote) GPIO daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpioOutput {
    /// Daemon host.
    pub host: String,
    /// Daemon port.
    pub port: u16,
    /// Pin number on the wire.
    pub pin: u32,
    /// Display name; matched against group names.
    pub name: String,
    /// Last written state.
    pub state: OutletState,
    /// Hook run after switching on.
    pub on_command: Option<String>,
    /// Hook run after switching off.
    pub off_command: Option<String>,
    /// Switch off again this long after switching on.
    pub auto_off: Option<Duration>,
}

impl GpioOutput {
    /// Creates an output from its pin definition. Outputs start off.
    #[must_use]
    pub fn from_config(cfg: &GpioPinConfig) -> Self {
        Self {
            host: cfg.host().to_string(),
            port: cfg.port(),
            pin: cfg.line(),
            name: cfg
                .name
                .clone()
                .unwrap_or_else(|| format!("GPIO {}", cfg.line())),
            state: OutletState::Off,
            on_command: cfg.on_command.clone(),
            off_command: cfg.off_command.clone(),
            auto_off: cfg
                .auto_off_after_seconds
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }

    /// Returns the `host:port` connection this output belongs to.
    #[must_use]
    pub fn connection_key(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the `host:port:pin` key identifying this output.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.host, self.port, self.pin)
    }

    /// Returns the hook for the given direction.
    #[must_use]
    pub fn command(&self, action: PowerAction) -> Option<&str> {
        match action {
            PowerAction::On => self.on_command.as_deref(),
            PowerAction::Off => self.off_command.as_deref(),
        }
        .filter(|cmd| !cmd.trim().is_empty())
    }
}

/// Live state of every output known to the process.
///
/// The store is plain data; the [`Orchestrator`](crate::engine::Orchestrator)
/// keeps it behind a short-lived lock and never holds that lock across a
/// device write.
///
/// # Examples
///
/// ```
/// use powerseq::state::{PduInfo, PduOutlet, StateStore};
/// use powerseq::types::OutletState;
///
/// let mut store = StateStore::new();
/// store.upsert_pdu(
///     "10.0.0.5",
///     PduInfo::new("rack-a", "RPDU2").with_outlet(PduOutlet::new("1", "Amp Rack")),
/// );
///
/// assert!(store.set_outlet_state("10.0.0.5", "1", OutletState::On));
/// assert!(!store.set_outlet_state("10.0.0.5", "9", OutletState::On));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    pdus: BTreeMap<String, PduInfo>,
    gpio_outputs: BTreeMap<String, GpioOutput>,
    manual_states: HashMap<String, OutletState>,
    special_actions: HashMap<String, PowerAction>,
    working_groups: BTreeMap<String, usize>,
}

impl StateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========== PDUs ==========

    /// Adds a PDU or replaces its description and outlet list.
    pub fn upsert_pdu(&mut self, host: impl Into<String>, info: PduInfo) {
        self.pdus.insert(host.into(), info);
    }

    /// Returns a PDU by host.
    #[must_use]
    pub fn pdu(&self, host: &str) -> Option<&PduInfo> {
        self.pdus.get(host)
    }

    /// Iterates PDUs ordered by host.
    pub fn pdus(&self) -> impl Iterator<Item = (&str, &PduInfo)> {
        self.pdus.iter().map(|(host, info)| (host.as_str(), info))
    }

    /// Updates one outlet's state. Returns false if the outlet is unknown.
    pub fn set_outlet_state(&mut self, host: &str, index: &str, state: OutletState) -> bool {
        let Some(outlet) = self.pdus.get_mut(host).and_then(|p| p.outlet_mut(index)) else {
            return false;
        };
        outlet.state = state;
        true
    }

    /// Applies a status poll: `(index, state)` pairs for one PDU.
    ///
    /// Unknown indices are ignored. Returns the number of outlets updated.
    pub fn apply_poll<'a, I>(&mut self, host: &str, states: I) -> usize
    where
        I: IntoIterator<Item = (&'a str, OutletState)>,
    {
        let Some(pdu) = self.pdus.get_mut(host) else {
            return 0;
        };
        let mut updated = 0;
        for (index, state) in states {
            if let Some(outlet) = pdu.outlet_mut(index) {
                outlet.state = state;
                updated += 1;
            }
        }
        updated
    }

    /// Renames a PDU outlet. Returns false if the outlet is unknown.
    pub fn rename_outlet(&mut self, host: &str, index: &str, name: impl Into<String>) -> bool {
        let Some(outlet) = self.pdus.get_mut(host).and_then(|p| p.outlet_mut(index)) else {
            return false;
        };
        outlet.name = name.into();
        true
    }

    // ========== GPIO ==========

    /// Registers an output, replacing any output with the same key.
    pub fn register_gpio_output(&mut self, output: GpioOutput) {
        self.gpio_outputs.insert(output.key(), output);
    }

    /// Returns an output by `host:port:pin` key.
    #[must_use]
    pub fn gpio_output(&self, key: &str) -> Option<&GpioOutput> {
        self.gpio_outputs.get(key)
    }

    /// Iterates outputs ordered by key.
    pub fn gpio_outputs(&self) -> impl Iterator<Item = (&str, &GpioOutput)> {
        self.gpio_outputs
            .iter()
            .map(|(key, output)| (key.as_str(), output))
    }

    /// Updates an output's state. Returns false if the output is unknown.
    pub fn set_gpio_state(&mut self, key: &str, state: OutletState) -> bool {
        let Some(output) = self.gpio_outputs.get_mut(key) else {
            return false;
        };
        output.state = state;
        true
    }

    /// Renames a GPIO output. Returns false if the output is unknown.
    pub fn rename_gpio_output(&mut self, key: &str, name: impl Into<String>) -> bool {
        let Some(output) = self.gpio_outputs.get_mut(key) else {
            return false;
        };
        output.name = name.into();
        true
    }

    /// Drops every output of a disconnected `host:port` connection.
    ///
    /// Returns the keys of the removed outputs.
    pub fn remove_gpio_connection(&mut self, host: &str, port: u16) -> Vec<String> {
        let removed: Vec<String> = self
            .gpio_outputs
            .iter()
            .filter(|(_, o)| o.host == host && o.port == port)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &removed {
            self.gpio_outputs.remove(key);
        }
        removed
    }

    // ========== Manual devices ==========

    /// Returns a manual device's state; devices never switched are off.
    #[must_use]
    pub fn manual_state(&self, name: &str) -> OutletState {
        self.manual_states
            .get(name)
            .copied()
            .unwrap_or(OutletState::Off)
    }

    /// Records a manual device's state.
    pub fn set_manual_state(&mut self, name: impl Into<String>, state: OutletState) {
        self.manual_states.insert(name.into(), state);
    }

    // ========== Special actions ==========

    /// Returns a special action's state; actions never triggered are off.
    #[must_use]
    pub fn special_action_state(&self, name: &str) -> PowerAction {
        self.special_actions
            .get(name)
            .copied()
            .unwrap_or(PowerAction::Off)
    }

    /// Records a special action's state.
    pub fn set_special_action_state(&mut self, name: impl Into<String>, state: PowerAction) {
        self.special_actions.insert(name.into(), state);
    }

    // ========== Working set ==========

    /// Marks a group as mid-orchestration.
    ///
    /// Marks are counted so that overlapping invocations for the same group
    /// keep it marked until the last one finishes. Returns true if the group
    /// was not marked before.
    pub fn mark_working(&mut self, group: &str) -> bool {
        let count = self.working_groups.entry(group.to_string()).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Releases one working mark. Returns true if the group is no longer marked.
    pub fn clear_working(&mut self, group: &str) -> bool {
        let Some(count) = self.working_groups.get_mut(group) else {
            return false;
        };
        *count -= 1;
        if *count == 0 {
            self.working_groups.remove(group);
            true
        } else {
            false
        }
    }

    /// Returns true if the group is currently being orchestrated.
    #[must_use]
    pub fn is_working(&self, group: &str) -> bool {
        self.working_groups.contains_key(group)
            || self
                .working_groups
                .keys()
                .any(|g| normalize(g) == normalize(group))
    }

    /// Returns the groups currently being orchestrated.
    #[must_use]
    pub fn working_groups(&self) -> Vec<String> {
        self.working_groups.keys().cloned().collect()
    }
}
