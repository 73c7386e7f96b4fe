// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Read-only view of the current state, grouped for display.
//!
//! [`project`] is a pure function of the [`StateStore`] and the
//! [`AppConfig`]. Group membership is derived, never stored: an outlet
//! belongs to every known group whose name occurs in the outlet name,
//! ignoring case. An outlet named `Lamp2 Desk` therefore belongs to both
//! `Lamp` and `Lamp2` when both are configured. Outlets that match no group
//! are listed under [`OTHER_GROUP`].
//!
//! The same view is broadcast to dashboard clients and consulted by the
//! toggle decision and the dependency checks of the engine.
//!
//! # Examples
//!
//! ```
//! use powerseq::config::AppConfig;
//! use powerseq::projection::{OTHER_GROUP, project};
//! use powerseq::state::{PduInfo, PduOutlet, StateStore};
//!
//! let config = AppConfig::from_json_str(r#"{ "groups": ["Lamp"] }"#).unwrap();
//! let mut store = StateStore::new();
//! store.upsert_pdu(
//!     "10.0.0.5",
//!     PduInfo::new("rack-a", "RPDU")
//!         .with_outlet(PduOutlet::new("1", "Living Room Lamp"))
//!         .with_outlet(PduOutlet::new("2", "Fridge")),
//! );
//!
//! let view = project(&store, &config);
//! assert_eq!(view.group("lamp").unwrap()[0].name, "Living Room Lamp");
//! assert_eq!(view.groups[OTHER_GROUP][0].name, "Fridge");
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::AppConfig;
use crate::state::{GpioOutput, StateStore};
use crate::types::{OutletState, PowerAction, normalize, same_name, sort_key};

/// Reserved group for outlets matching no known group.
pub const OTHER_GROUP: &str = "Other";

/// Device key of the synthetic device holding manual devices.
pub const MANUAL_DEVICE_KEY: &str = "Manual";

/// Prefix of the synthetic device keys of GPIO connections.
pub const GPIO_DEVICE_PREFIX: &str = "GPIO:";

/// How to reach one outlet for a write.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OutletRef {
    /// PDU outlet.
    Pdu {
        /// PDU host.
        host: String,
        /// SNMP outlet index.
        index: String,
    },
    /// GPIO output, by `host:port:pin` key.
    Gpio {
        /// Output key.
        key: String,
    },
    /// Manual device, by name.
    Manual {
        /// Device name.
        name: String,
    },
}

/// Full projected view.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicState {
    /// Devices keyed by host, `GPIO:host:port` or `Manual`.
    pub pdus: BTreeMap<String, PublicDevice>,
    /// Group members keyed by group name.
    pub groups: BTreeMap<String, Vec<GroupOutlet>>,
    /// Display settings of groups that declare them.
    pub group_configs: BTreeMap<String, GroupStyle>,
    /// Special actions in configuration order.
    pub special_actions: Vec<PublicSpecialAction>,
    /// Groups currently being orchestrated.
    pub working_groups: Vec<String>,
}

impl PublicState {
    /// Returns the members of a group, looked up ignoring case.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<&[GroupOutlet]> {
        self.groups
            .get(name)
            .or_else(|| {
                self.groups
                    .iter()
                    .find(|(key, _)| same_name(key, name))
                    .map(|(_, outlets)| outlets)
            })
            .map(Vec::as_slice)
    }

    /// Returns true if at least one member outlet of the group is on.
    #[must_use]
    pub fn is_group_on(&self, name: &str) -> bool {
        self.group(name)
            .is_some_and(|outlets| outlets.iter().any(|o| o.state.is_on()))
    }
}

/// A device as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicDevice {
    /// Display name.
    pub sys_name: String,
    /// Location or connection string.
    pub sys_location: String,
    /// `RPDU`, `RPDU2`, `GPIO` or `Manual`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Outlets sorted by name.
    pub outlets: Vec<PublicOutlet>,
}

/// An outlet inside a [`PublicDevice`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicOutlet {
    /// SNMP index, pin number or manual device name.
    pub index: String,
    /// Outlet name.
    pub name: String,
    /// Last known state.
    pub state: OutletState,
}

/// An outlet inside a group listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupOutlet {
    /// Key of the owning device in [`PublicState::pdus`].
    pub host: String,
    /// SNMP index, pin number or manual device name.
    pub index: String,
    /// Outlet name.
    pub name: String,
    /// Last known state.
    pub state: OutletState,
    /// Display name of the owning device.
    pub pdu_name: String,
    /// Location of the owning device.
    pub location: String,
    /// Kind of the owning device.
    #[serde(rename = "type")]
    pub kind: String,
    /// Write target.
    #[serde(skip)]
    pub target: OutletRef,
}

/// Display settings of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStyle {
    /// Indicator colour.
    pub led_color: String,
}

/// A special action and its state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicSpecialAction {
    /// Action name.
    pub name: String,
    /// Current state.
    pub state: PowerAction,
}

/// Orders names alphabetically, ignoring accents and case first.
///
/// Ties are broken by the lowercase form, then the raw name, so the order
/// is total and deterministic.
#[must_use]
pub fn compare_names(a: &str, b: &str) -> Ordering {
    sort_key(a)
        .cmp(&sort_key(b))
        .then_with(|| normalize(a).cmp(&normalize(b)))
        .then_with(|| a.cmp(b))
}

/// Derives the display view from the store and the configuration.
#[must_use]
pub fn project(store: &StateStore, config: &AppConfig) -> PublicState {
    let mut view = PublicState::default();

    for group in &config.groups {
        if let Some(color) = group.config().and_then(|cfg| cfg.led_color.as_ref()) {
            view.group_configs.insert(
                group.name().to_string(),
                GroupStyle {
                    led_color: color.clone(),
                },
            );
        }
    }

    let all_outlets = flatten_outlets(store, config, &mut view);
    let known_groups = config.known_group_names();
    let lowered: Vec<String> = known_groups.iter().map(|g| normalize(g)).collect();

    for outlet in all_outlets {
        let name = normalize(&outlet.name);
        let mut matched = false;
        for (group, lower) in known_groups.iter().zip(&lowered) {
            if name.contains(lower.as_str()) {
                view.groups
                    .entry(group.clone())
                    .or_default()
                    .push(outlet.clone());
                matched = true;
            }
        }
        if !matched {
            view.groups
                .entry(OTHER_GROUP.to_string())
                .or_default()
                .push(outlet);
        }
    }

    for outlets in view.groups.values_mut() {
        outlets.sort_by(|a, b| compare_names(&a.name, &b.name));
    }

    view.special_actions = config
        .special_actions
        .iter()
        .map(|action| PublicSpecialAction {
            name: action.name.clone(),
            state: store.special_action_state(&action.name),
        })
        .collect();
    view.working_groups = store.working_groups();

    view
}

/// Fills `view.pdus` and returns every outlet as a group listing entry.
fn flatten_outlets(
    store: &StateStore,
    config: &AppConfig,
    view: &mut PublicState,
) -> Vec<GroupOutlet> {
    let mut all = Vec::new();

    for (host, pdu) in store.pdus() {
        let mut outlets = Vec::with_capacity(pdu.outlets.len());
        for outlet in &pdu.outlets {
            outlets.push(PublicOutlet {
                index: outlet.index.clone(),
                name: outlet.name.clone(),
                state: outlet.state,
            });
            all.push(GroupOutlet {
                host: host.to_string(),
                index: outlet.index.clone(),
                name: outlet.name.clone(),
                state: outlet.state,
                pdu_name: pdu.sys_name.clone(),
                location: pdu.sys_location.clone(),
                kind: pdu.kind.clone(),
                target: OutletRef::Pdu {
                    host: host.to_string(),
                    index: outlet.index.clone(),
                },
            });
        }
        insert_device(
            view,
            host.to_string(),
            &pdu.sys_name,
            &pdu.sys_location,
            &pdu.kind,
            outlets,
        );
    }

    let mut by_connection: BTreeMap<String, Vec<(&str, &GpioOutput)>> = BTreeMap::new();
    for (key, output) in store.gpio_outputs() {
        by_connection
            .entry(output.connection_key())
            .or_default()
            .push((key, output));
    }
    for (connection, outputs) in by_connection {
        let device_key = format!("{GPIO_DEVICE_PREFIX}{connection}");
        let device_name = format!("GPIO ({connection})");
        let mut outlets = Vec::with_capacity(outputs.len());
        for (key, output) in outputs {
            outlets.push(PublicOutlet {
                index: output.pin.to_string(),
                name: output.name.clone(),
                state: output.state,
            });
            all.push(GroupOutlet {
                host: device_key.clone(),
                index: output.pin.to_string(),
                name: output.name.clone(),
                state: output.state,
                pdu_name: device_name.clone(),
                location: connection.clone(),
                kind: "GPIO".to_string(),
                target: OutletRef::Gpio {
                    key: key.to_string(),
                },
            });
        }
        insert_device(view, device_key, &device_name, &connection, "GPIO", outlets);
    }

    if !config.manual_devices.is_empty() {
        let mut outlets = Vec::with_capacity(config.manual_devices.len());
        for device in &config.manual_devices {
            let state = store.manual_state(&device.name);
            outlets.push(PublicOutlet {
                index: device.name.clone(),
                name: device.name.clone(),
                state,
            });
            all.push(GroupOutlet {
                host: MANUAL_DEVICE_KEY.to_string(),
                index: device.name.clone(),
                name: device.name.clone(),
                state,
                pdu_name: "Manual Devices".to_string(),
                location: "Various".to_string(),
                kind: "Manual".to_string(),
                target: OutletRef::Manual {
                    name: device.name.clone(),
                },
            });
        }
        insert_device(
            view,
            MANUAL_DEVICE_KEY.to_string(),
            "Manual Devices",
            "Various",
            "Manual",
            outlets,
        );
    }

    all
}

fn insert_device(
    view: &mut PublicState,
    key: String,
    sys_name: &str,
    sys_location: &str,
    kind: &str,
    mut outlets: Vec<PublicOutlet>,
) {
    outlets.sort_by(|a, b| compare_names(&a.name, &b.name));
    view.pdus.insert(
        key,
        PublicDevice {
            sys_name: sys_name.to_string(),
            sys_location: sys_location.to_string(),
            kind: kind.to_string(),
            outlets,
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GpioPinConfig;
    use crate::state::{PduInfo, PduOutlet};

    fn config() -> AppConfig {
        AppConfig::from_json_str(
            r##"{
                "groups": ["Lamp", { "name": "Lamp2", "ledColor": "#00ff00" }, "Rack"],
                "gpio": [{ "pin": 4, "group": "Porch" }],
                "schedules": [{ "time": "07:00", "action": "on", "groups": ["Coffee"] }],
                "manualDevices": [{ "name": "Coffee Maker" }],
                "specialActions": [{ "name": "Doorbell" }]
            }"##,
        )
        .unwrap()
    }

    fn store() -> StateStore {
        let mut store = StateStore::new();
        store.upsert_pdu(
            "10.0.0.5",
            PduInfo::new("rack-a", "RPDU2")
                .with_location("basement")
                .with_outlet(PduOutlet::new("1", "Living Room Lamp").with_state(OutletState::On))
                .with_outlet(PduOutlet::new("2", "Fridge").with_state(OutletState::Off))
                .with_outlet(PduOutlet::new("3", "audio rack"))
                .with_outlet(PduOutlet::new("4", "Lamp2 Desk")),
        );
        for (host, pin, name) in [
            ("10.0.0.9", 17, "Porch Light"),
            ("10.0.0.9", 18, "Attic Fan"),
            ("10.0.0.10", 5, "Bench Lamp"),
        ] {
            store.register_gpio_output(GpioOutput::from_config(&GpioPinConfig {
                pin,
                host: Some(host.to_string()),
                name: Some(name.to_string()),
                ..GpioPinConfig::default()
            }));
        }
        store
    }

    fn names(outlets: &[GroupOutlet]) -> Vec<&str> {
        outlets.iter().map(|o| o.name.as_str()).collect()
    }

    #[test]
    fn substring_membership_and_other() {
        let view = project(&store(), &config());

        assert_eq!(
            names(&view.groups["Lamp"]),
            ["Bench Lamp", "Lamp2 Desk", "Living Room Lamp"]
        );
        assert_eq!(names(&view.groups["Rack"]), ["audio rack"]);
        assert_eq!(names(&view.groups["Porch"]), ["Porch Light"]);
        assert_eq!(names(&view.groups["Coffee"]), ["Coffee Maker"]);
        assert_eq!(names(&view.groups[OTHER_GROUP]), ["Attic Fan", "Fridge"]);
    }

    #[test]
    fn overlapping_group_names_share_outlets() {
        let view = project(&store(), &config());

        assert_eq!(names(&view.groups["Lamp2"]), ["Lamp2 Desk"]);
        assert!(names(&view.groups["Lamp"]).contains(&"Lamp2 Desk"));
    }

    #[test]
    fn gpio_outputs_grouped_per_connection() {
        let view = project(&store(), &config());

        let device = &view.pdus["GPIO:10.0.0.9:8888"];
        assert_eq!(device.sys_name, "GPIO (10.0.0.9:8888)");
        assert_eq!(device.kind, "GPIO");
        let outlet_names: Vec<&str> = device.outlets.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(outlet_names, ["Attic Fan", "Porch Light"]);
        assert!(view.pdus.contains_key("GPIO:10.0.0.10:8888"));

        let porch = &view.groups["Porch"][0];
        assert_eq!(
            porch.target,
            OutletRef::Gpio {
                key: "10.0.0.9:8888:17".to_string()
            }
        );
    }

    #[test]
    fn pdu_outlets_sorted_ignoring_case() {
        let view = project(&store(), &config());

        let outlet_names: Vec<&str> = view.pdus["10.0.0.5"]
            .outlets
            .iter()
            .map(|o| o.name.as_str())
            .collect();
        assert_eq!(
            outlet_names,
            ["audio rack", "Fridge", "Lamp2 Desk", "Living Room Lamp"]
        );
    }

    #[test]
    fn accented_names_sort_with_their_base_letter() {
        let mut names = ["Zebra", "Éclairage", "apple", "eclairage"];
        names.sort_by(|a, b| compare_names(a, b));

        assert_eq!(names, ["apple", "eclairage", "Éclairage", "Zebra"]);
    }

    #[test]
    fn manual_devices_default_off() {
        let view = project(&store(), &config());

        let manual = &view.pdus[MANUAL_DEVICE_KEY];
        assert_eq!(manual.outlets[0].state, OutletState::Off);
        assert_eq!(
            view.groups["Coffee"][0].target,
            OutletRef::Manual {
                name: "Coffee Maker".to_string()
            }
        );
    }

    #[test]
    fn extras_are_projected() {
        let mut store = store();
        store.mark_working("Rack");
        store.set_special_action_state("Doorbell", PowerAction::On);

        let view = project(&store, &config());

        assert_eq!(view.group_configs["Lamp2"].led_color, "#00ff00");
        assert!(!view.group_configs.contains_key("Lamp"));
        assert_eq!(view.special_actions[0].state, PowerAction::On);
        assert_eq!(view.working_groups, ["Rack"]);
    }

    #[test]
    fn group_lookup_and_aggregate_state() {
        let view = project(&store(), &config());

        assert!(view.is_group_on("LAMP"));
        assert!(!view.is_group_on("Rack"));
        assert!(!view.is_group_on("Nope"));
        assert!(view.group("nope").is_none());
    }

    #[test]
    fn projection_is_deterministic() {
        let store = store();
        let config = config();
        assert_eq!(project(&store, &config), project(&store, &config));
    }

    #[test]
    fn serializes_with_dashboard_field_names() {
        let view = project(&store(), &config());
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["pdus"]["10.0.0.5"]["type"], "RPDU2");
        assert_eq!(json["pdus"]["10.0.0.5"]["sysLocation"], "basement");
        assert_eq!(json["groups"]["Lamp"][0]["pduName"], "GPIO (10.0.0.10:8888)");
        assert_eq!(json["groupConfigs"]["Lamp2"]["ledColor"], "#00ff00");
        assert!(json["groups"]["Lamp"][0].get("target").is_none());
    }

    #[test]
    fn empty_inputs_give_empty_view() {
        let view = project(&StateStore::new(), &AppConfig::default());
        assert_eq!(view, PublicState::default());
    }
}
