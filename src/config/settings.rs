// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Runtime tuning for the orchestrator.

use std::time::Duration;

/// Default pause between two non-delayed outlet writes.
pub const DEFAULT_SETTLE_PAUSE: Duration = Duration::from_millis(100);

/// Default capacity of the snapshot broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Default cadence at which the schedule driver polls the clock.
pub const DEFAULT_SCHEDULE_POLL: Duration = Duration::from_secs(10);

/// Tuning knobs that are not part of the persisted configuration.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use powerseq::config::EngineSettings;
///
/// let settings = EngineSettings::new()
///     .with_settle_pause(Duration::from_millis(250))
///     .with_event_capacity(64);
///
/// assert_eq!(settings.settle_pause, Duration::from_millis(250));
/// assert_eq!(settings.event_capacity, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Pause after each write in the non-delayed part of a group action.
    pub settle_pause: Duration,
    /// Buffered snapshots per subscriber before slow receivers lag.
    pub event_capacity: usize,
    /// Interval used by [`Scheduler::spawn`](crate::engine::Scheduler::spawn).
    pub schedule_poll: Duration,
}

impl EngineSettings {
    /// Creates settings with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the settle pause between non-delayed writes.
    #[must_use]
    pub fn with_settle_pause(mut self, pause: Duration) -> Self {
        self.settle_pause = pause;
        self
    }

    /// Sets the broadcast channel capacity.
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Sets the schedule polling interval.
    #[must_use]
    pub fn with_schedule_poll(mut self, interval: Duration) -> Self {
        self.schedule_poll = interval;
        self
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            settle_pause: DEFAULT_SETTLE_PAUSE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            schedule_poll: DEFAULT_SCHEDULE_POLL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = EngineSettings::default();

        assert_eq!(settings.settle_pause, Duration::from_millis(100));
        assert_eq!(settings.event_capacity, 256);
        assert_eq!(settings.schedule_poll, Duration::from_secs(10));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let settings = EngineSettings::new().with_event_capacity(0);
        assert_eq!(settings.event_capacity, 1);
    }
}
