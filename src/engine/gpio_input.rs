// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! GPIO input pins driving groups.
//!
//! A hardware collaborator reports level changes per `host:port:pin` key;
//! [`GpioInputs`] turns them into group actions:
//!
//! - `switch` pins follow the level: high switches the group on, low off.
//!   The first report for a pin always fires, as does the initial read
//!   after setup.
//! - `momentary` pins toggle the group when a high pulse at least
//!   `minTimeMs` long ends. Shorter pulses are treated as bounce.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::backend::Backend;
use crate::config::{GpioMode, GpioPinConfig};
use crate::types::PowerAction;

use super::Orchestrator;

#[derive(Debug)]
struct InputPin {
    config: GpioPinConfig,
    last_level: Option<bool>,
    high_since: Option<Instant>,
}

impl InputPin {
    fn new(config: GpioPinConfig) -> Self {
        Self {
            config,
            last_level: None,
            high_since: None,
        }
    }
}

/// Tracks input pin levels and triggers their groups.
#[derive(Debug)]
pub struct GpioInputs<B> {
    engine: Orchestrator<B>,
    pins: Mutex<HashMap<String, InputPin>>,
}

impl<B: Backend> GpioInputs<B> {
    /// Creates a tracker for every non-output pin in the engine's
    /// configuration.
    #[must_use]
    pub fn new(engine: Orchestrator<B>) -> Self {
        let inputs = Self {
            engine,
            pins: Mutex::new(HashMap::new()),
        };
        inputs.reload();
        inputs
    }

    /// Re-reads the pin list from the engine's current configuration.
    ///
    /// Pins that survive the reload keep their last level.
    pub fn reload(&self) {
        let config = self.engine.config();
        let mut pins = self.pins.lock();
        let mut next = HashMap::new();
        for pin in config.gpio.pins() {
            if pin.mode == GpioMode::Output {
                continue;
            }
            let key = pin.key();
            let entry = match pins.remove(&key) {
                Some(mut existing) => {
                    existing.config = pin;
                    existing
                }
                None => InputPin::new(pin),
            };
            next.insert(key, entry);
        }
        *pins = next;
    }

    /// Returns the keys of the tracked input pins, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.pins.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Handles a level report for the pin `key`.
    ///
    /// `initial` marks the first read after the pin was set up. Returns the
    /// handle of the spawned group action, if the report fired one. Reports
    /// for unknown pins are ignored.
    pub fn handle_change(&self, key: &str, level: bool, initial: bool) -> Option<JoinHandle<()>> {
        let mut pins = self.pins.lock();
        let pin = pins.get_mut(key)?;
        let previous = pin.last_level.replace(level);

        let group = pin.config.group.clone()?;
        match pin.config.mode {
            GpioMode::Switch => {
                if !initial && previous == Some(level) {
                    return None;
                }
                let action = PowerAction::from(level);
                tracing::info!(key, group = %group, high = level, %action, "GPIO switch changed");
                Some(tokio::spawn(self.engine.boxed_trigger(Some(group), action)))
            }
            GpioMode::Momentary => {
                if level {
                    pin.high_since = Some(Instant::now());
                    return None;
                }
                let held = pin.high_since.take()?.elapsed();
                if held < pin.config.min_pulse() {
                    tracing::debug!(key, held_ms = held.as_millis(), "GPIO pulse too short");
                    return None;
                }
                tracing::info!(
                    key,
                    group = %group,
                    held_ms = held.as_millis(),
                    "GPIO pulse, toggling group"
                );
                Some(tokio::spawn(self.engine.boxed_toggle(group)))
            }
            GpioMode::Output => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::AppConfig;
    use crate::error::DeviceError;
    use crate::state::GpioOutput;

    struct NoopBackend;

    impl Backend for NoopBackend {
        async fn write_outlet(&self, _: &str, _: &str, _: PowerAction) -> Result<(), DeviceError> {
            Ok(())
        }

        async fn write_gpio(&self, _: &GpioOutput, _: PowerAction) -> Result<(), DeviceError> {
            Ok(())
        }
    }

    const SWITCH: &str = "127.0.0.1:8888:4";
    const BUTTON: &str = "127.0.0.1:8888:5";

    fn inputs() -> GpioInputs<NoopBackend> {
        let config = AppConfig::from_json_str(
            r#"{
                "gpio": [
                    { "pin": 4, "group": "Porch" },
                    { "pin": 5, "group": "Lamp", "mode": "momentary", "minTimeMs": 80 },
                    { "pin": 6, "mode": "output", "name": "Relay" },
                    { "pin": 7 }
                ]
            }"#,
        )
        .unwrap();
        GpioInputs::new(Orchestrator::new(NoopBackend, config))
    }

    #[test]
    fn tracks_only_input_pins() {
        assert_eq!(
            inputs().keys(),
            ["127.0.0.1:8888:4", "127.0.0.1:8888:5", "127.0.0.1:8888:7"]
        );
    }

    #[tokio::test]
    async fn switch_fires_on_initial_read_and_level_changes() {
        let inputs = inputs();

        assert!(inputs.handle_change(SWITCH, false, true).is_some());
        assert!(inputs.handle_change(SWITCH, false, false).is_none());
        assert!(inputs.handle_change(SWITCH, true, false).is_some());
        assert!(inputs.handle_change(SWITCH, true, false).is_none());
        assert!(inputs.handle_change(SWITCH, false, false).is_some());
    }

    #[tokio::test]
    async fn first_switch_report_fires_even_when_low() {
        let inputs = inputs();

        assert!(inputs.handle_change(SWITCH, false, false).is_some());
        assert!(inputs.handle_change(SWITCH, false, false).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn momentary_toggles_on_long_enough_pulse() {
        let inputs = inputs();

        assert!(inputs.handle_change(BUTTON, true, false).is_none());
        tokio::time::advance(Duration::from_millis(30)).await;
        assert!(inputs.handle_change(BUTTON, false, false).is_none(), "bounce");

        assert!(inputs.handle_change(BUTTON, true, false).is_none());
        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(inputs.handle_change(BUTTON, false, false).is_some());
    }

    #[tokio::test]
    async fn momentary_release_without_press_is_ignored() {
        let inputs = inputs();
        assert!(inputs.handle_change(BUTTON, false, true).is_none());
    }

    #[tokio::test]
    async fn pins_without_group_and_unknown_pins_are_ignored() {
        let inputs = inputs();

        assert!(inputs.handle_change("127.0.0.1:8888:7", true, true).is_none());
        assert!(inputs.handle_change("10.9.9.9:8888:4", true, true).is_none());
    }
}
