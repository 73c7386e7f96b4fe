// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `powerseq` - power sequencing for PDU outlets, GPIO relays and manual
//! devices.
//!
//! Outlets are organised into named groups by substring match on their
//! names. The [`Orchestrator`] switches a group on or off in a defined order:
//! dependencies first, undelayed outlets one at a time, delayed outlets at
//! their configured offsets, with optional automatic switch-off afterwards.
//!
//! # Supported Features
//!
//! - **Group sequencing**: dependencies, per-outlet delays, auto-off
//! - **Toggle**: off if any member is on, otherwise on
//! - **Schedules**: time-of-day actions, optionally per weekday
//! - **Special actions**: command-only on/off actions with auto-off
//! - **GPIO inputs**: switch and momentary pins driving groups
//! - **Live view**: projected state snapshots broadcast to subscribers
//!
//! The crate does not speak SNMP or any GPIO protocol itself; writes go
//! through a [`Backend`] supplied by the application.
//!
//! # Quick Start
//!
//! ```no_run
//! use powerseq::{AppConfig, Backend, DeviceError, Orchestrator, PowerAction};
//! use powerseq::state::{GpioOutput, PduInfo, PduOutlet};
//!
//! struct MyDevices;
//!
//! impl Backend for MyDevices {
//!     async fn write_outlet(&self, host: &str, index: &str, action: PowerAction) -> Result<(), DeviceError> {
//!         // SNMP set goes here
//!         Ok(())
//!     }
//!
//!     async fn write_gpio(&self, output: &GpioOutput, action: PowerAction) -> Result<(), DeviceError> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> powerseq::Result<()> {
//!     let config = AppConfig::from_json_str(r#"{
//!         "groups": [{ "name": "Amp", "dependsOn": ["Mixer"], "autoOffAfterSeconds": 3600 }]
//!     }"#)?;
//!     let engine = Orchestrator::new(MyDevices, config);
//!
//!     engine.update_store(|store| {
//!         store.upsert_pdu(
//!             "10.0.0.5",
//!             PduInfo::new("rack-a", "RPDU")
//!                 .with_outlet(PduOutlet::new("1", "Mixer"))
//!                 .with_outlet(PduOutlet::new("2", "Amp Left"))
//!                 .with_outlet(PduOutlet::new("3", "Amp Right")),
//!         );
//!     });
//!
//!     // Switches the mixer, then both amps, and arms a one hour auto-off
//!     engine.trigger_group(Some("Amp"), PowerAction::On).await;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod projection;
pub mod state;
pub mod types;

pub use backend::Backend;
pub use config::{AppConfig, EngineSettings};
pub use engine::{GpioInputs, Orchestrator, Scheduler};
pub use error::{ConfigError, DeviceError, Error, Result, ValueError};
pub use event::{EventBus, Snapshot};
pub use projection::PublicState;
pub use types::{OutletState, PowerAction, ScheduleTime};
