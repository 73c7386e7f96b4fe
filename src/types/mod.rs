// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared across the crate.
//!
//! # Types
//!
//! - [`PowerAction`] - On/Off requests
//! - [`OutletState`] - On/Off/Unknown as tracked by the state store
//! - [`ScheduleTime`] - `HH:MM` time of day for schedule entries

mod name;
mod power;
mod time;

pub use name::{name_contains, normalize, same_name, sort_key};
pub use power::{OutletState, PowerAction};
pub use time::{ScheduleTime, weekday_abbrev};
