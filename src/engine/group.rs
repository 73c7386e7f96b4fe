// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Group sequencing.
//!
//! One invocation of [`Orchestrator::trigger_group`] runs these steps in
//! order, awaiting each before the next:
//!
//! 1. Skip the group if this top-level call already visited it.
//! 2. Cancel the group's pending auto-off.
//! 3. When switching on, switch its dependencies on first.
//! 4. Mark the group as working (cleared on every exit path).
//! 5. Start the group's shell hooks, detached.
//! 6. Switch matching outlets: undelayed ones alphabetically with a settle
//!    pause after each, then delayed ones at their offset from the start of
//!    the delayed phase.
//! 7. When switching on, arm the group's auto-off.
//! 8. When switching off, switch off each dependency no other lit group
//!    still depends on.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::Instant;

use crate::backend::Backend;
use crate::config::{AppConfig, GroupEntry};
use crate::projection::{OTHER_GROUP, OutletRef, PublicState, compare_names};
use crate::state::{StateStore, TimerKey, deadline_after};
use crate::types::{PowerAction, name_contains, normalize, same_name};

use super::{BoxFuture, Orchestrator};

/// Chooses the action a toggle applies: off if any member outlet is on.
///
/// Unknown groups have no lit members and toggle on.
#[must_use]
pub fn toggle_action(view: &PublicState, group: &str) -> PowerAction {
    if view.is_group_on(group) {
        PowerAction::Off
    } else {
        PowerAction::On
    }
}

/// One outlet write within a group action.
#[derive(Debug, Clone, PartialEq)]
struct Task {
    name: String,
    target: OutletRef,
    delay: Duration,
}

impl<B: Backend> Orchestrator<B> {
    /// Switches a group on or off; `None` addresses every outlet.
    ///
    /// Never fails: write errors are logged per outlet and the remaining
    /// outlets are still switched. Unknown groups switch whatever outlets
    /// happen to match the name, which may be none.
    ///
    /// Outlets are matched by case-insensitive substring, so with groups
    /// `Lamp` and `Lamp2` configured, triggering `Lamp` also switches
    /// `Lamp2 Desk`.
    pub async fn trigger_group(&self, group: Option<&str>, action: PowerAction) {
        let mut visited = HashSet::new();
        self.run_group(group, action, &mut visited).await;
    }

    /// Toggles a group based on its current aggregate state.
    pub async fn toggle_group(&self, group: &str) {
        let action = toggle_action(&self.snapshot(), group);
        tracing::info!(group, %action, "Toggling group");
        self.trigger_group(Some(group), action).await;
    }

    pub(crate) fn boxed_trigger(
        &self,
        group: Option<String>,
        action: PowerAction,
    ) -> BoxFuture<'static> {
        let engine = self.clone();
        Box::pin(async move {
            engine.trigger_group(group.as_deref(), action).await;
        })
    }

    pub(crate) fn boxed_toggle(&self, group: String) -> BoxFuture<'static> {
        let engine = self.clone();
        Box::pin(async move {
            engine.toggle_group(&group).await;
        })
    }

    fn run_group<'a>(
        &'a self,
        group: Option<&'a str>,
        action: PowerAction,
        visited: &'a mut HashSet<String>,
    ) -> BoxFuture<'a> {
        Box::pin(async move {
            if let Some(name) = group {
                if !visited.insert(normalize(name)) {
                    tracing::debug!(group = name, "Group already handled, skipping");
                    return;
                }
                self.inner.timers.cancel(&TimerKey::group(name));
            }

            let config = self.config();
            if let Some(name) = group {
                if same_name(name, OTHER_GROUP) && config.group(name).is_none() {
                    self.run_other(action).await;
                    return;
                }
            }
            let entry = group.and_then(|name| config.group(name));

            if let (PowerAction::On, Some(entry)) = (action, entry) {
                for dependency in entry.depends_on() {
                    self.run_group(Some(dependency.as_str()), PowerAction::On, visited)
                        .await;
                }
            }

            tracing::info!(group = group.unwrap_or("All"), %action, "Triggering group");
            {
                let _working = group.map(|name| self.mark_working(name));

                self.fire_group_hooks(&config, group, action);

                let tasks = self.with_store(|store| plan_tasks(store, &config, group, action));
                self.run_tasks(tasks, action).await;

                if let (PowerAction::On, Some(name), Some(after)) =
                    (action, group, entry.and_then(GroupEntry::auto_off))
                {
                    tracing::info!(
                        group = name,
                        seconds = after.as_secs(),
                        "Group auto-off armed"
                    );
                    self.inner.timers.arm(
                        TimerKey::group(name),
                        after,
                        self.boxed_auto_off(name.to_string()),
                    );
                }
            }

            if let (PowerAction::Off, Some(name), Some(entry)) = (action, group, entry) {
                for dependency in entry.depends_on() {
                    if self.dependency_still_needed(&config, dependency, name) {
                        tracing::info!(
                            group = name,
                            dependency = %dependency,
                            "Keeping shared dependency on"
                        );
                        continue;
                    }
                    self.run_group(Some(dependency.as_str()), PowerAction::Off, visited)
                        .await;
                }
            }
        })
    }

    fn fire_group_hooks(&self, config: &AppConfig, group: Option<&str>, action: PowerAction) {
        let matching = config
            .groups
            .iter()
            .filter(|g| group.is_none_or(|name| same_name(g.name(), name)));
        for entry in matching {
            if let Some(command) = entry.command(action) {
                tracing::debug!(group = entry.name(), %action, "Starting group hook");
                self.spawn_hook(command);
            }
        }
    }

    async fn run_tasks(&self, tasks: Vec<Task>, action: PowerAction) {
        let (mut immediate, mut delayed): (Vec<Task>, Vec<Task>) =
            tasks.into_iter().partition(|task| task.delay.is_zero());
        immediate.sort_by(|a, b| compare_names(&a.name, &b.name));
        delayed.sort_by_key(|task| task.delay);

        let pause = self.inner.settings.settle_pause;
        for task in &immediate {
            tracing::debug!(outlet = %task.name, %action, "Switching outlet");
            self.switch(&task.target, action).await;
            tokio::time::sleep(pause).await;
        }

        let start = Instant::now();
        for task in &delayed {
            tokio::time::sleep_until(deadline_after(start, task.delay)).await;
            tracing::debug!(
                outlet = %task.name,
                %action,
                delay_ms = task.delay.as_millis(),
                "Switching delayed outlet"
            );
            self.switch(&task.target, action).await;
        }
    }

    /// Switches every outlet currently listed under "Other".
    ///
    /// No hooks, dependencies or delays apply.
    async fn run_other(&self, action: PowerAction) {
        tracing::info!(group = OTHER_GROUP, %action, "Triggering ungrouped outlets");
        let members = self
            .snapshot()
            .groups
            .remove(OTHER_GROUP)
            .unwrap_or_default();

        let pause = self.inner.settings.settle_pause;
        for outlet in &members {
            self.switch(&outlet.target, action).await;
            tokio::time::sleep(pause).await;
        }
    }

    /// Returns true if a group other than `excluding` depends on
    /// `dependency` and is currently lit.
    fn dependency_still_needed(
        &self,
        config: &AppConfig,
        dependency: &str,
        excluding: &str,
    ) -> bool {
        let consumers: Vec<&str> = config
            .groups
            .iter()
            .filter(|g| !same_name(g.name(), excluding) && g.depends_on_group(dependency))
            .map(GroupEntry::name)
            .collect();
        if consumers.is_empty() {
            return false;
        }

        let view = self.snapshot();
        consumers.iter().any(|name| view.is_group_on(name))
    }

    fn boxed_auto_off(&self, group: String) -> BoxFuture<'static> {
        let engine = self.clone();
        Box::pin(async move {
            tracing::info!(group = %group, "Group auto-off fired");
            engine.trigger_group(Some(&group), PowerAction::Off).await;
        })
    }
}

/// Builds the write list for a group action.
fn plan_tasks(
    store: &StateStore,
    config: &AppConfig,
    group: Option<&str>,
    action: PowerAction,
) -> Vec<Task> {
    let matches = |name: &str| group.is_none_or(|g| name_contains(name, g));
    let task = |name: &str, target: OutletRef| Task {
        name: name.to_string(),
        target,
        delay: config.delay_for(name, action),
    };

    let mut tasks = Vec::new();
    for (host, pdu) in store.pdus() {
        for outlet in pdu.outlets.iter().filter(|o| matches(&o.name)) {
            tasks.push(task(
                &outlet.name,
                OutletRef::Pdu {
                    host: host.to_string(),
                    index: outlet.index.clone(),
                },
            ));
        }
    }
    for (key, output) in store.gpio_outputs() {
        if matches(&output.name) {
            tasks.push(task(
                &output.name,
                OutletRef::Gpio {
                    key: key.to_string(),
                },
            ));
        }
    }
    for device in config.manual_devices.iter().filter(|d| matches(&d.name)) {
        tasks.push(task(
            &device.name,
            OutletRef::Manual {
                name: device.name.clone(),
            },
        ));
    }
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GpioPinConfig;
    use crate::projection::project;
    use crate::state::{GpioOutput, PduInfo, PduOutlet};
    use crate::types::OutletState;

    fn config() -> AppConfig {
        AppConfig::from_json_str(
            r#"{
                "groups": ["Amp"],
                "discoveredDeviceCustomizations": {
                    "Amp Sub": { "delayOnSeconds": 5 },
                    "Amp Main": { "delayOnSeconds": 2, "delayOffSeconds": 0 }
                },
                "manualDevices": [{ "name": "Amp Tuner", "delayOnSeconds": 1 }]
            }"#,
        )
        .unwrap()
    }

    fn store() -> StateStore {
        let mut store = StateStore::new();
        store.upsert_pdu(
            "10.0.0.5",
            PduInfo::new("rack-a", "RPDU")
                .with_outlet(PduOutlet::new("1", "Amp Sub"))
                .with_outlet(PduOutlet::new("2", "Amp Main").with_state(OutletState::On))
                .with_outlet(PduOutlet::new("3", "Fridge")),
        );
        store.register_gpio_output(GpioOutput::from_config(&GpioPinConfig {
            pin: 17,
            name: Some("amp fan".to_string()),
            ..GpioPinConfig::default()
        }));
        store
    }

    #[test]
    fn plan_matches_by_substring_across_device_types() {
        let tasks = plan_tasks(&store(), &config(), Some("AMP"), PowerAction::On);

        let names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Amp Sub", "Amp Main", "amp fan", "Amp Tuner"]);
    }

    #[test]
    fn plan_uses_direction_specific_delays() {
        let on = plan_tasks(&store(), &config(), Some("Amp"), PowerAction::On);
        let off = plan_tasks(&store(), &config(), Some("Amp"), PowerAction::Off);

        let delays =
            |tasks: &[Task]| tasks.iter().map(|t| t.delay.as_secs()).collect::<Vec<_>>();
        assert_eq!(delays(&on), [5, 2, 0, 1]);
        assert_eq!(delays(&off), [0, 0, 0, 0]);
    }

    #[test]
    fn plan_without_group_takes_everything() {
        let tasks = plan_tasks(&store(), &config(), None, PowerAction::Off);
        assert_eq!(tasks.len(), 5);
    }

    #[test]
    fn plan_for_unknown_group_is_empty() {
        assert!(plan_tasks(&store(), &config(), Some("Garage"), PowerAction::On).is_empty());
    }

    #[test]
    fn toggle_turns_off_when_any_member_is_on() {
        let view = project(&store(), &config());

        assert_eq!(toggle_action(&view, "Amp"), PowerAction::Off);
        assert_eq!(toggle_action(&view, "Nothing"), PowerAction::On);
    }
}
