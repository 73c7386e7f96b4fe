// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration types.
//!
//! [`AppConfig`] mirrors the persisted JSON document (groups, schedules,
//! GPIO pins, manual devices, special actions, per-outlet delays). It is
//! owned by the embedding application and handed to the
//! [`Orchestrator`](crate::engine::Orchestrator), which replaces it
//! wholesale on update.
//!
//! [`EngineSettings`] holds runtime tuning that is not persisted.

mod app_config;
mod settings;

pub use app_config::{
    AppConfig, DEFAULT_GPIO_HOST, DEFAULT_GPIO_PORT, DEFAULT_MIN_PULSE_MS, DeviceCustomization,
    GpioMode, GpioPinConfig, GpioSection, GroupConfig, GroupEntry, ManualDevice, ScheduleEntry,
    SpecialActionConfig,
};
pub use settings::{
    DEFAULT_EVENT_CAPACITY, DEFAULT_SCHEDULE_POLL, DEFAULT_SETTLE_PAUSE, EngineSettings,
};
