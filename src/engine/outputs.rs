// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Single-output setters.
//!
//! Each setter writes through the backend, records the new state and
//! broadcasts. A failed write is logged and leaves the recorded state alone.

use crate::backend::Backend;
use crate::projection::{GPIO_DEVICE_PREFIX, MANUAL_DEVICE_KEY, OutletRef};
use crate::state::TimerKey;
use crate::types::PowerAction;

use super::{BoxFuture, Orchestrator};

impl<B: Backend> Orchestrator<B> {
    /// Switches one PDU outlet.
    ///
    /// Unknown hosts are ignored.
    pub async fn set_outlet_state(&self, host: &str, index: &str, action: PowerAction) {
        let known = self.inner.store.lock().pdu(host).is_some();
        if !known {
            tracing::debug!(host, outlet = index, "Unknown PDU, ignoring write");
            return;
        }

        match self.inner.backend.write_outlet(host, index, action).await {
            Ok(()) => {
                tracing::info!(host, outlet = index, %action, "Outlet switched");
                let updated = self
                    .inner
                    .store
                    .lock()
                    .set_outlet_state(host, index, action.into());
                if updated {
                    self.broadcast();
                }
            }
            Err(e) => {
                tracing::warn!(
                    host,
                    outlet = index,
                    %action,
                    error = %e,
                    "Failed to switch outlet"
                );
            }
        }
    }

    /// Switches one GPIO output by its `host:port:pin` key.
    ///
    /// Any pending auto-off for the pin is cancelled first. After a
    /// successful write the output's own hook runs to completion, the state
    /// is recorded and broadcast, and switching on re-arms the pin's
    /// auto-off if it has one. Unknown keys are ignored.
    pub async fn set_gpio_output_state(&self, key: &str, action: PowerAction) {
        let output = self.inner.store.lock().gpio_output(key).cloned();
        let Some(output) = output else {
            tracing::debug!(key, "Unknown GPIO output, ignoring write");
            return;
        };

        let timer = TimerKey::pin(key);
        self.inner.timers.cancel(&timer);

        if let Err(e) = self.inner.backend.write_gpio(&output, action).await {
            tracing::warn!(
                key,
                name = %output.name,
                %action,
                error = %e,
                "Failed to switch GPIO output"
            );
            return;
        }
        tracing::info!(key, name = %output.name, %action, "GPIO output switched");

        if let Some(command) = output.command(action) {
            if let Err(e) = self.inner.backend.run_command(command).await {
                tracing::warn!(key, error = %e, "GPIO output hook failed");
            }
        }

        self.inner.store.lock().set_gpio_state(key, action.into());
        self.broadcast();

        if let (PowerAction::On, Some(after)) = (action, output.auto_off) {
            tracing::info!(key, seconds = after.as_secs(), "GPIO output auto-off armed");
            self.inner
                .timers
                .arm(timer, after, self.boxed_gpio_off(key.to_string()));
        }
    }

    /// Switches a manual device by name.
    ///
    /// The device's hook is started on a detached task; the state is
    /// recorded immediately. Unknown devices are ignored.
    pub fn run_manual_command(&self, name: &str, action: PowerAction) {
        let config = self.config();
        let Some(device) = config.manual_device(name) else {
            tracing::debug!(device = name, "Unknown manual device, ignoring");
            return;
        };

        if let Some(command) = device.command(action) {
            self.spawn_hook(command);
        }
        tracing::info!(device = name, %action, "Manual device switched");
        self.inner
            .store
            .lock()
            .set_manual_state(device.name.clone(), action.into());
        self.broadcast();
    }

    /// Switches one outlet addressed the way the projected view lists it.
    ///
    /// `device_key` is a PDU host, `GPIO:host:port` or `Manual`; `index` is
    /// the outlet index, pin number or manual device name respectively.
    pub async fn trigger_outlet(&self, device_key: &str, index: &str, action: PowerAction) {
        tracing::debug!(device = device_key, index, %action, "Outlet command");
        self.switch(&outlet_ref(device_key, index), action).await;
    }

    /// Renames an outlet addressed like [`trigger_outlet`](Self::trigger_outlet).
    ///
    /// Only the in-memory name changes; persisting it is up to the caller.
    /// Returns false if the outlet is unknown.
    pub fn rename_outlet(&self, device_key: &str, index: &str, name: &str) -> bool {
        let renamed = match outlet_ref(device_key, index) {
            OutletRef::Pdu { host, index } => {
                self.inner.store.lock().rename_outlet(&host, &index, name)
            }
            OutletRef::Gpio { key } => self.inner.store.lock().rename_gpio_output(&key, name),
            OutletRef::Manual { .. } => false,
        };
        if renamed {
            tracing::info!(device = device_key, index, name, "Outlet renamed");
            self.broadcast();
        }
        renamed
    }

    /// Dispatches one write to the setter for its device type.
    pub(crate) async fn switch(&self, target: &OutletRef, action: PowerAction) {
        match target {
            OutletRef::Pdu { host, index } => self.set_outlet_state(host, index, action).await,
            OutletRef::Gpio { key } => self.set_gpio_output_state(key, action).await,
            OutletRef::Manual { name } => self.run_manual_command(name, action),
        }
    }

    fn boxed_gpio_off(&self, key: String) -> BoxFuture<'static> {
        let engine = self.clone();
        Box::pin(async move {
            tracing::info!(key = %key, "GPIO output auto-off fired");
            engine.set_gpio_output_state(&key, PowerAction::Off).await;
        })
    }
}

fn outlet_ref(device_key: &str, index: &str) -> OutletRef {
    if device_key == MANUAL_DEVICE_KEY {
        OutletRef::Manual {
            name: index.to_string(),
        }
    } else if let Some(connection) = device_key.strip_prefix(GPIO_DEVICE_PREFIX) {
        OutletRef::Gpio {
            key: format!("{connection}:{index}"),
        }
    } else {
        OutletRef::Pdu {
            host: device_key.to_string(),
            index: index.to_string(),
        }
    }
}
