// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event bus for broadcasting state snapshots.

use tokio::sync::broadcast;

use super::Snapshot;
use crate::config::DEFAULT_EVENT_CAPACITY;

/// Event bus for broadcasting state snapshots to multiple subscribers.
///
/// The `EventBus` uses tokio's broadcast channel so that every subscriber
/// receives every snapshot. Snapshots are reference counted, so publishing
/// does not copy the view per subscriber.
///
/// # Capacity
///
/// The event bus has a fixed capacity (default 256). A subscriber that falls
/// behind loses the oldest snapshots and receives `RecvError::Lagged`; since
/// each snapshot is a full view, catching up on the next one is enough.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Snapshot>,
}

impl EventBus {
    /// Creates a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Creates a new event bus with the specified capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to snapshots published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Snapshot> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Returns true if at least one subscriber is listening.
    #[must_use]
    pub fn has_subscribers(&self) -> bool {
        self.subscriber_count() > 0
    }

    /// Publishes a snapshot to all subscribers.
    ///
    /// If there are no subscribers, the snapshot is silently discarded.
    pub fn publish(&self, snapshot: Snapshot) {
        // No subscribers is not an error
        let _ = self.sender.send(snapshot);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::projection::PublicState;

    fn snapshot(working: &str) -> Snapshot {
        Arc::new(PublicState {
            working_groups: vec![working.to_string()],
            ..PublicState::default()
        })
    }

    #[test]
    fn new_bus_has_no_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        assert!(!bus.has_subscribers());
    }

    #[test]
    fn subscribe_and_drop_track_count() {
        let bus = EventBus::new();

        let rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(rx1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn publish_delivers_same_snapshot_to_every_subscriber() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(snapshot("Amp"));

        let first = rx1.recv().await.unwrap();
        let second = rx2.recv().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.working_groups, ["Amp"]);
    }

    #[test]
    fn slow_subscriber_lags() {
        let bus = EventBus::with_capacity(2);
        let mut rx = bus.subscribe();

        for name in ["a", "b", "c"] {
            bus.publish(snapshot(name));
        }

        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(1))
        ));
        assert_eq!(rx.try_recv().unwrap().working_groups, ["b"]);
    }

    #[test]
    fn clone_shares_same_channel() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();

        let _rx = bus1.subscribe();
        assert_eq!(bus2.subscriber_count(), 1);
    }
}
