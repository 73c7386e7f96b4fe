// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Group orchestration.
//!
//! The [`Orchestrator`] owns the configuration, the [`StateStore`], the
//! auto-off timers and the snapshot [`EventBus`], and drives every write
//! through a [`Backend`]. Its public operations never fail: device write
//! errors are logged where they happen and surface only as state that did
//! not change in the next broadcast snapshot.
//!
//! - [`Orchestrator::trigger_group`] sequences a group (or every outlet) on
//!   or off, honouring dependencies, per-outlet delays and auto-off.
//! - [`Orchestrator::toggle_group`] picks the action from the group's
//!   current aggregate state.
//! - [`Orchestrator::trigger_special_action`] drives command-only actions.
//! - [`Scheduler`] fires configured time-of-day entries.
//! - [`GpioInputs`] turns input pin edges into group actions.
//!
//! # Examples
//!
//! ```no_run
//! use powerseq::backend::Backend;
//! use powerseq::config::AppConfig;
//! use powerseq::engine::{Orchestrator, Scheduler};
//! use powerseq::types::PowerAction;
//! # use powerseq::error::DeviceError;
//! # use powerseq::state::GpioOutput;
//! # struct Snmp;
//! # impl Backend for Snmp {
//! #     async fn write_outlet(&self, _: &str, _: &str, _: PowerAction) -> Result<(), DeviceError> { Ok(()) }
//! #     async fn write_gpio(&self, _: &GpioOutput, _: PowerAction) -> Result<(), DeviceError> { Ok(()) }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> powerseq::Result<()> {
//!     let config = AppConfig::load("config.json")?;
//!     let engine = Orchestrator::new(Snmp, config);
//!
//!     let mut snapshots = engine.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(view) = snapshots.recv().await {
//!             println!("{} groups", view.groups.len());
//!         }
//!     });
//!
//!     Scheduler::new(engine.clone()).spawn();
//!     engine.trigger_group(Some("Amp"), PowerAction::On).await;
//!     Ok(())
//! }
//! ```

mod gpio_input;
mod group;
mod outputs;
mod schedule;
mod special;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;

use crate::backend::Backend;
use crate::config::{AppConfig, EngineSettings, GpioMode};
use crate::event::{EventBus, Snapshot};
use crate::projection::{PublicState, project};
use crate::state::{GpioOutput, StateStore, TimerRegistry};

pub use gpio_input::GpioInputs;
pub use group::toggle_action;
pub use schedule::Scheduler;

/// A detached unit of engine work.
pub(crate) type BoxFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// The orchestration context shared by every engine operation.
///
/// Cloning is cheap: clones share the same configuration, state, timers and
/// event bus. Spawned work (auto-off timers, schedule firings, hooks) holds a
/// clone.
pub struct Orchestrator<B> {
    inner: Arc<Shared<B>>,
}

struct Shared<B> {
    backend: B,
    settings: EngineSettings,
    config: RwLock<Arc<AppConfig>>,
    store: Mutex<StateStore>,
    timers: Arc<TimerRegistry>,
    events: EventBus,
}

impl<B> Clone for Orchestrator<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B> std::fmt::Debug for Orchestrator<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("settings", &self.inner.settings)
            .field("pending_timers", &self.inner.timers.len())
            .field("subscribers", &self.inner.events.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl<B: Backend> Orchestrator<B> {
    /// Creates an orchestrator with default settings.
    ///
    /// GPIO pins configured as outputs are registered in the store,
    /// initially off.
    #[must_use]
    pub fn new(backend: B, config: AppConfig) -> Self {
        Self::with_settings(backend, config, EngineSettings::default())
    }

    /// Creates an orchestrator with custom settings.
    #[must_use]
    pub fn with_settings(backend: B, config: AppConfig, settings: EngineSettings) -> Self {
        let mut store = StateStore::new();
        sync_gpio_outputs(&mut store, &config);

        Self {
            inner: Arc::new(Shared {
                backend,
                events: EventBus::with_capacity(settings.event_capacity),
                settings,
                config: RwLock::new(Arc::new(config)),
                store: Mutex::new(store),
                timers: Arc::new(TimerRegistry::new()),
            }),
        }
    }

    /// Returns the device backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Runs a hook on a detached task; failures are logged.
    pub(crate) fn spawn_hook(&self, command: &str) {
        let engine = self.clone();
        let command = command.to_string();
        tokio::spawn(async move {
            if let Err(e) = engine.inner.backend.run_command(&command).await {
                tracing::warn!(error = %e, "Hook failed");
            }
        });
    }
}

impl<B> Orchestrator<B> {
    // =========================================================================
    // Subscription
    // =========================================================================

    /// Subscribes to state snapshots.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Snapshot> {
        self.inner.events.subscribe()
    }

    /// Returns the snapshot event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Projects the current state.
    #[must_use]
    pub fn snapshot(&self) -> PublicState {
        let config = self.config();
        let store = self.inner.store.lock();
        project(&store, &config)
    }

    /// Publishes a fresh snapshot, if anyone is listening.
    pub fn broadcast(&self) {
        if self.inner.events.has_subscribers() {
            self.inner.events.publish(Arc::new(self.snapshot()));
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Returns the current configuration.
    #[must_use]
    pub fn config(&self) -> Arc<AppConfig> {
        self.inner.config.read().clone()
    }

    /// Returns the engine settings.
    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    /// Replaces the configuration wholesale and broadcasts.
    ///
    /// Output pins of the new configuration are (re)registered, keeping the
    /// last known state of pins that already existed. Pending timers and
    /// in-flight operations are left alone.
    pub fn update_config(&self, config: AppConfig) {
        sync_gpio_outputs(&mut *self.inner.store.lock(), &config);
        *self.inner.config.write() = Arc::new(config);
        tracing::info!("Configuration updated");
        self.broadcast();
    }

    // =========================================================================
    // State
    // =========================================================================

    /// Reads the state store.
    pub fn with_store<R>(&self, f: impl FnOnce(&StateStore) -> R) -> R {
        f(&*self.inner.store.lock())
    }

    /// Mutates the state store, then broadcasts.
    ///
    /// This is the entry point for discovery and polling collaborators.
    pub fn update_store<R>(&self, f: impl FnOnce(&mut StateStore) -> R) -> R {
        let result = f(&mut *self.inner.store.lock());
        self.broadcast();
        result
    }

    /// Returns the pending auto-off timers.
    #[must_use]
    pub fn timers(&self) -> &TimerRegistry {
        &self.inner.timers
    }

    /// Cancels every pending auto-off timer.
    pub fn shutdown(&self) {
        self.inner.timers.cancel_all();
        tracing::info!("Orchestrator shut down, pending timers cancelled");
    }

    fn mark_working(&self, group: &str) -> WorkingGuard<'_, B> {
        self.inner.store.lock().mark_working(group);
        self.broadcast();
        WorkingGuard {
            engine: self,
            group: group.to_string(),
        }
    }
}

/// Keeps a group in the working set for as long as it lives.
struct WorkingGuard<'a, B> {
    engine: &'a Orchestrator<B>,
    group: String,
}

impl<B> Drop for WorkingGuard<'_, B> {
    fn drop(&mut self) {
        self.engine.inner.store.lock().clear_working(&self.group);
        self.engine.broadcast();
    }
}

fn sync_gpio_outputs(store: &mut StateStore, config: &AppConfig) {
    for pin in config.gpio.pins() {
        if pin.mode != GpioMode::Output {
            continue;
        }
        let mut output = GpioOutput::from_config(&pin);
        if let Some(existing) = store.gpio_output(&output.key()) {
            output.state = existing.state;
        }
        store.register_gpio_output(output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeviceError;
    use crate::types::{OutletState, PowerAction};

    struct NoopBackend;

    impl Backend for NoopBackend {
        async fn write_outlet(&self, _: &str, _: &str, _: PowerAction) -> Result<(), DeviceError> {
            Ok(())
        }

        async fn write_gpio(&self, _: &GpioOutput, _: PowerAction) -> Result<(), DeviceError> {
            Ok(())
        }
    }

    fn config(json: &str) -> AppConfig {
        AppConfig::from_json_str(json).unwrap()
    }

    #[test]
    fn output_pins_registered_on_creation() {
        let engine = Orchestrator::new(
            NoopBackend,
            config(r#"{ "gpio": [{ "pin": 17, "mode": "output", "name": "Fan" }, { "pin": 4 }] }"#),
        );

        let keys: Vec<String> =
            engine.with_store(|s| s.gpio_outputs().map(|(k, _)| k.to_string()).collect());
        assert_eq!(keys, ["127.0.0.1:8888:17"]);
    }

    #[test]
    fn update_config_keeps_output_state() {
        let engine = Orchestrator::new(
            NoopBackend,
            config(r#"{ "gpio": [{ "pin": 17, "mode": "output", "name": "Fan" }] }"#),
        );
        engine.update_store(|s| s.set_gpio_state("127.0.0.1:8888:17", OutletState::On));

        engine.update_config(config(
            r#"{ "gpio": [{ "pin": 17, "mode": "output", "name": "Ceiling Fan" }] }"#,
        ));

        let output = engine
            .with_store(|s| s.gpio_output("127.0.0.1:8888:17").cloned())
            .unwrap();
        assert_eq!(output.name, "Ceiling Fan");
        assert_eq!(output.state, OutletState::On);
    }

    #[tokio::test]
    async fn update_store_broadcasts() {
        let engine = Orchestrator::new(NoopBackend, AppConfig::default());
        let mut rx = engine.subscribe();

        engine.update_store(|s| s.set_special_action_state("Doorbell", PowerAction::On));

        let view = rx.recv().await.unwrap();
        assert!(view.special_actions.is_empty(), "unconfigured actions are not listed");
    }

    #[test]
    fn working_guard_clears_on_drop() {
        let engine = Orchestrator::new(NoopBackend, AppConfig::default());

        {
            let _guard = engine.mark_working("Amp");
            assert!(engine.with_store(|s| s.is_working("amp")));
        }

        assert!(!engine.with_store(|s| s.is_working("Amp")));
    }

    #[test]
    fn working_guard_broadcasts_both_edges() {
        let engine = Orchestrator::new(NoopBackend, AppConfig::default());
        let mut rx = engine.subscribe();

        drop(engine.mark_working("Amp"));

        assert_eq!(rx.try_recv().unwrap().working_groups, ["Amp"]);
        assert!(rx.try_recv().unwrap().working_groups.is_empty());
    }
}
