// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Live state shared by every orchestration operation.
//!
//! [`StateStore`] holds outlet states (PDU outlets, GPIO outputs, manual
//! devices), special-action states and the set of groups currently being
//! orchestrated. [`TimerRegistry`] holds the pending auto-off reversals.
//!
//! # Examples
//!
//! ```
//! use powerseq::state::{PduInfo, PduOutlet, StateStore};
//! use powerseq::types::OutletState;
//!
//! let mut store = StateStore::new();
//! store.upsert_pdu("10.0.0.5", PduInfo::new("rack-a", "RPDU").with_outlet(PduOutlet::new("1", "Fridge")));
//! store.apply_poll("10.0.0.5", [("1", OutletState::On)]);
//!
//! assert_eq!(store.pdu("10.0.0.5").unwrap().outlets[0].state, OutletState::On);
//! ```

mod store;
mod timers;

pub use store::{GpioOutput, PduInfo, PduOutlet, StateStore};
pub use timers::{MAX_DELAY, TimerKey, TimerRegistry, deadline_after};
