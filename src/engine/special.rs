// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command-only actions with an on/off state.

use crate::backend::Backend;
use crate::state::TimerKey;
use crate::types::PowerAction;

use super::{BoxFuture, Orchestrator};

impl<B: Backend> Orchestrator<B> {
    /// Switches a special action on or off.
    ///
    /// Any pending auto-off for the action is cancelled, its hook runs to
    /// completion, and the new state is recorded and broadcast. Switching on
    /// arms the configured auto-off. Unknown names are ignored.
    pub async fn trigger_special_action(&self, name: &str, action: PowerAction) {
        let config = self.config();
        let Some(special) = config.special_action(name) else {
            tracing::debug!(action_name = name, "Unknown special action, ignoring");
            return;
        };

        let timer = TimerKey::special_action(name);
        self.inner.timers.cancel(&timer);
        tracing::info!(action_name = name, %action, "Triggering special action");

        if let Some(command) = special.command(action) {
            if let Err(e) = self.inner.backend.run_command(command).await {
                tracing::warn!(action_name = name, error = %e, "Special action hook failed");
            }
        }
        self.inner
            .store
            .lock()
            .set_special_action_state(name, action);

        if let (PowerAction::On, Some(after)) = (action, special.auto_off()) {
            tracing::info!(
                action_name = name,
                seconds = after.as_secs(),
                "Special action auto-off armed"
            );
            self.inner
                .timers
                .arm(timer, after, self.boxed_special_off(name.to_string()));
        }

        self.broadcast();
    }

    fn boxed_special_off(&self, name: String) -> BoxFuture<'static> {
        let engine = self.clone();
        Box::pin(async move {
            tracing::info!(action_name = %name, "Special action auto-off fired");
            engine.trigger_special_action(&name, PowerAction::Off).await;
        })
    }
}
