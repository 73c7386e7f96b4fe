// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The persisted configuration document.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use chrono::Weekday;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigError;
use crate::types::{PowerAction, ScheduleTime, same_name, weekday_abbrev};

/// Default host for GPIO pins without an explicit host.
pub const DEFAULT_GPIO_HOST: &str = "127.0.0.1";

/// Default port of a remote GPIO daemon.
pub const DEFAULT_GPIO_PORT: u16 = 8888;

/// Default minimum pulse length for momentary inputs.
pub const DEFAULT_MIN_PULSE_MS: u64 = 50;

/// Whole application configuration, as stored in `config.json`.
///
/// Unknown top-level keys (subnets to scan, static PDU addresses, ...) are
/// kept in [`extra`](Self::extra) so that a config update round-trips.
///
/// # Examples
///
/// ```
/// use powerseq::config::AppConfig;
///
/// let config = AppConfig::from_json_str(r#"{
///     "groups": ["Lamp", { "name": "Amp", "dependsOn": ["Mixer"] }],
///     "schedules": [{ "time": "07:00", "action": "on", "groups": ["Lamp"] }]
/// }"#).unwrap();
///
/// assert_eq!(config.groups.len(), 2);
/// assert_eq!(config.group("amp").unwrap().depends_on(), ["Mixer".to_string()]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Logical groups, either a bare name or a full definition.
    pub groups: Vec<GroupEntry>,
    /// GPIO pin definitions.
    #[serde(alias = "rpi-gpio")]
    pub gpio: GpioSection,
    /// Time-of-day actions. Malformed entries are skipped with a warning.
    #[serde(deserialize_with = "lenient_schedules")]
    pub schedules: Vec<ScheduleEntry>,
    /// Per-outlet tuning keyed by outlet name.
    pub discovered_device_customizations: BTreeMap<String, DeviceCustomization>,
    /// Virtual outlets backed only by shell hooks.
    pub manual_devices: Vec<ManualDevice>,
    /// Command-only actions.
    pub special_actions: Vec<SpecialActionConfig>,
    /// Keys not interpreted by this crate.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AppConfig {
    /// Parses a configuration document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Json` if the document is malformed.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read and
    /// `ConfigError::Json` if it is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    /// Serializes the configuration as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Json` if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Finds a configured group by case-insensitive name.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&GroupEntry> {
        self.groups
            .iter()
            .find(|g| same_name(g.name(), name))
    }

    /// Finds a manual device by exact name.
    #[must_use]
    pub fn manual_device(&self, name: &str) -> Option<&ManualDevice> {
        self.manual_devices.iter().find(|d| d.name == name)
    }

    /// Finds a special action by exact name.
    #[must_use]
    pub fn special_action(&self, name: &str) -> Option<&SpecialActionConfig> {
        self.special_actions.iter().find(|a| a.name == name)
    }

    /// Returns every group name referenced anywhere in the configuration.
    ///
    /// Names come from the group list, GPIO pin groups and schedule group
    /// lists, in that order. Duplicates are removed; the first spelling wins.
    #[must_use]
    pub fn known_group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut push = |name: &str| {
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        };

        for group in &self.groups {
            push(group.name());
        }
        for name in self.gpio.group_names() {
            push(name);
        }
        for schedule in &self.schedules {
            for name in &schedule.groups {
                push(name);
            }
        }

        names
    }

    /// Returns the configured delay for an outlet in the given direction.
    ///
    /// Customizations win over a manual device's own delay fields. Missing,
    /// negative and non-finite values mean no delay.
    #[must_use]
    pub fn delay_for(&self, outlet_name: &str, action: PowerAction) -> Duration {
        if let Some(custom) = self.discovered_device_customizations.get(outlet_name) {
            return custom.delay(action);
        }
        self.manual_device(outlet_name)
            .map_or(Duration::ZERO, |device| {
                seconds(match action {
                    PowerAction::On => device.delay_on_seconds,
                    PowerAction::Off => device.delay_off_seconds,
                })
            })
    }
}

/// A group entry: either a bare name or a full definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupEntry {
    /// Group known only by name.
    Name(String),
    /// Group with hooks, dependencies or auto-off.
    Detailed(GroupConfig),
}

impl GroupEntry {
    /// Returns the group name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Detailed(cfg) => &cfg.name,
        }
    }

    /// Returns the full definition, if any.
    #[must_use]
    pub fn config(&self) -> Option<&GroupConfig> {
        match self {
            Self::Name(_) => None,
            Self::Detailed(cfg) => Some(cfg),
        }
    }

    /// Returns the groups this one depends on.
    #[must_use]
    pub fn depends_on(&self) -> &[String] {
        self.config()
            .map_or(&[][..], |cfg| cfg.depends_on.as_slice())
    }

    /// Returns true if the group depends on `name` (case-insensitive).
    #[must_use]
    pub fn depends_on_group(&self, name: &str) -> bool {
        self.depends_on()
            .iter()
            .any(|d| same_name(d, name))
    }

    /// Returns the shell hook for the given direction.
    #[must_use]
    pub fn command(&self, action: PowerAction) -> Option<&str> {
        let cfg = self.config()?;
        match action {
            PowerAction::On => cfg.on_command.as_deref(),
            PowerAction::Off => cfg.off_command.as_deref(),
        }
        .filter(|cmd| !cmd.trim().is_empty())
    }

    /// Returns the auto-off delay, if one is configured.
    #[must_use]
    pub fn auto_off(&self) -> Option<Duration> {
        self.config()
            .and_then(|cfg| cfg.auto_off_after_seconds)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

impl From<&str> for GroupEntry {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<GroupConfig> for GroupEntry {
    fn from(cfg: GroupConfig) -> Self {
        Self::Detailed(cfg)
    }
}

/// Full definition of a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupConfig {
    /// Group name; matched as a substring of outlet names.
    pub name: String,
    /// Indicator colour shown by the dashboard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub led_color: Option<String>,
    /// Shell hook run when the group is switched on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_command: Option<String>,
    /// Shell hook run when the group is switched off.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub off_command: Option<String>,
    /// Groups switched on before, and possibly off after, this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Switch the group off again this many seconds after switching it on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_off_after_seconds: Option<u64>,
}

impl GroupConfig {
    /// Creates a group definition with only a name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a dependency.
    #[must_use]
    pub fn depends_on(mut self, group: impl Into<String>) -> Self {
        self.depends_on.push(group.into());
        self
    }

    /// Sets the auto-off delay in seconds.
    #[must_use]
    pub fn with_auto_off(mut self, seconds: u64) -> Self {
        self.auto_off_after_seconds = Some(seconds);
        self
    }

    /// Sets the on/off shell hooks.
    #[must_use]
    pub fn with_commands(
        mut self,
        on_command: impl Into<String>,
        off_command: impl Into<String>,
    ) -> Self {
        self.on_command = Some(on_command.into());
        self.off_command = Some(off_command.into());
        self
    }

    /// Sets the indicator colour.
    #[must_use]
    pub fn with_led_color(mut self, color: impl Into<String>) -> Self {
        self.led_color = Some(color.into());
        self
    }
}

/// A time-of-day action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    /// Local time at which the entry fires.
    pub time: ScheduleTime,
    /// Action to apply.
    pub action: PowerAction,
    /// Target groups; empty means every outlet.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    /// Day abbreviations (`Mon`..`Sun`); empty means every day.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub days: Vec<String>,
}

impl ScheduleEntry {
    /// Returns true if the entry is active on `day`.
    #[must_use]
    pub fn runs_on(&self, day: Weekday) -> bool {
        let abbrev = weekday_abbrev(day);
        self.days.is_empty() || self.days.iter().any(|d| d.eq_ignore_ascii_case(abbrev))
    }
}

/// Per-outlet tuning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCustomization {
    /// Seconds to wait before switching this outlet on during a group action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_on_seconds: Option<f64>,
    /// Seconds to wait before switching this outlet off during a group action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_off_seconds: Option<f64>,
}

impl DeviceCustomization {
    /// Returns the delay for the given direction.
    #[must_use]
    pub fn delay(&self, action: PowerAction) -> Duration {
        seconds(match action {
            PowerAction::On => self.delay_on_seconds,
            PowerAction::Off => self.delay_off_seconds,
        })
    }
}

/// A virtual outlet driven only by shell hooks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualDevice {
    /// Device name; also its outlet name.
    pub name: String,
    /// Hook run when switched on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_command: Option<String>,
    /// Hook run when switched off.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub off_command: Option<String>,
    /// Delay applied when no customization exists for the name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_on_seconds: Option<f64>,
    /// Delay applied when no customization exists for the name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_off_seconds: Option<f64>,
}

impl ManualDevice {
    /// Returns the shell hook for the given direction.
    #[must_use]
    pub fn command(&self, action: PowerAction) -> Option<&str> {
        match action {
            PowerAction::On => self.on_command.as_deref(),
            PowerAction::Off => self.off_command.as_deref(),
        }
        .filter(|cmd| !cmd.trim().is_empty())
    }
}

/// A command-only action with its own on/off state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialActionConfig {
    /// Action name, matched exactly.
    pub name: String,
    /// Hook run when switched on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_command: Option<String>,
    /// Hook run when switched off.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub off_command: Option<String>,
    /// Switch off again this many seconds after switching on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_off_after_seconds: Option<u64>,
}

impl SpecialActionConfig {
    /// Returns the shell hook for the given direction.
    #[must_use]
    pub fn command(&self, action: PowerAction) -> Option<&str> {
        match action {
            PowerAction::On => self.on_command.as_deref(),
            PowerAction::Off => self.off_command.as_deref(),
        }
        .filter(|cmd| !cmd.trim().is_empty())
    }

    /// Returns the auto-off delay, if one is configured.
    #[must_use]
    pub fn auto_off(&self) -> Option<Duration> {
        self.auto_off_after_seconds
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// The GPIO section: a pin list, or the legacy `{ "pin": "group" }` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GpioSection {
    /// Full pin definitions.
    Pins(Vec<GpioPinConfig>),
    /// Pin number to group name; every pin is a switch input.
    Legacy(BTreeMap<String, String>),
}

impl GpioSection {
    /// Returns the group names referenced by GPIO pins.
    pub fn group_names(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match self {
            Self::Pins(pins) => Box::new(pins.iter().filter_map(|p| p.group.as_deref())),
            Self::Legacy(map) => Box::new(map.values().map(String::as_str)),
        }
    }

    /// Returns normalized pin definitions.
    ///
    /// Legacy entries become switch inputs named after their group; entries
    /// whose key is not a pin number are skipped.
    #[must_use]
    pub fn pins(&self) -> Vec<GpioPinConfig> {
        match self {
            Self::Pins(pins) => pins.clone(),
            Self::Legacy(map) => map
                .iter()
                .filter_map(|(pin, group)| {
                    let pin = pin.parse().ok()?;
                    Some(GpioPinConfig {
                        pin,
                        group: Some(group.clone()),
                        name: Some(group.clone()),
                        ..GpioPinConfig::default()
                    })
                })
                .collect(),
        }
    }
}

impl Default for GpioSection {
    fn default() -> Self {
        Self::Pins(Vec::new())
    }
}

/// How a GPIO pin is used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpioMode {
    /// Input; its level drives the group on or off.
    #[default]
    Switch,
    /// Input; a pulse toggles the group.
    Momentary,
    /// Relay output.
    Output,
}

/// Definition of one GPIO pin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpioPinConfig {
    /// Physical or BCM pin number.
    pub pin: u32,
    /// BCM pin number, if different from `pin`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bcm_pin: Option<u32>,
    /// Group driven by an input pin, or referenced by an output pin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Pin usage.
    #[serde(default)]
    pub mode: GpioMode,
    /// Display name of an output; defaults to `GPIO <pin>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// GPIO daemon host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// GPIO daemon port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Hook run after an output is switched on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_command: Option<String>,
    /// Hook run after an output is switched off.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub off_command: Option<String>,
    /// Switch an output off again this many seconds after switching it on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_off_after_seconds: Option<u64>,
    /// Minimum pulse length for momentary inputs, in milliseconds.
    #[serde(default, alias = "minTime", skip_serializing_if = "Option::is_none")]
    pub min_time_ms: Option<u64>,
    /// Indicator colour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Pull-up/down setting, passed through to the hardware backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull: Option<String>,
}

impl GpioPinConfig {
    /// Returns the host, defaulting to the local daemon.
    #[must_use]
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_GPIO_HOST)
    }

    /// Returns the port, defaulting to the standard daemon port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_GPIO_PORT)
    }

    /// Returns the pin number used on the wire.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.bcm_pin.unwrap_or(self.pin)
    }

    /// Returns the `host:port:pin` key identifying this pin.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}:{}", self.host(), self.port(), self.line())
    }

    /// Returns the minimum pulse length for momentary inputs.
    #[must_use]
    pub fn min_pulse(&self) -> Duration {
        Duration::from_millis(self.min_time_ms.unwrap_or(DEFAULT_MIN_PULSE_MS))
    }
}

fn lenient_schedules<'de, D>(deserializer: D) -> Result<Vec<ScheduleEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match ScheduleEntry::deserialize(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(index, error = %e, "Skipping invalid schedule entry");
                None
            }
        })
        .collect())
}

fn seconds(value: Option<f64>) -> Duration {
    value
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .unwrap_or(Duration::ZERO)
}
