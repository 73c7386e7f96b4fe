// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broadcast of state snapshots to live clients.
//!
//! Every state change made by the [`Orchestrator`](crate::engine::Orchestrator)
//! ends with a [`Snapshot`] of the projected view published on the
//! [`EventBus`]. Subscribers (typically a WebSocket layer) receive the full
//! view each time; there are no deltas.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use powerseq::event::EventBus;
//! use powerseq::projection::PublicState;
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.publish(Arc::new(PublicState::default()));
//! assert!(rx.try_recv().is_ok());
//! ```

mod event_bus;

use std::sync::Arc;

use crate::projection::PublicState;

pub use event_bus::EventBus;

/// A projected view, shared between all subscribers.
pub type Snapshot = Arc<PublicState>;
