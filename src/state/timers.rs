// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Keyed one-shot timers for automatic reversal.
//!
//! Each armed timer is a spawned tokio task sleeping until its deadline.
//! The registry keeps at most one timer per [`TimerKey`]: arming a key
//! aborts whatever was pending under it, and a timer removes its own entry
//! right before it fires so the reversal it runs can never be aborted by a
//! later cancellation of the same key.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::types::normalize;

/// Longest wait the engine schedules. Longer delays are clamped to it.
pub const MAX_DELAY: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// Returns `start + delay`, with `delay` clamped to [`MAX_DELAY`].
#[must_use]
pub fn deadline_after(start: Instant, delay: Duration) -> Instant {
    start + delay.min(MAX_DELAY)
}

/// Identity of a pending reversal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Group auto-off, keyed by normalized group name.
    Group(String),
    /// GPIO output auto-off, keyed by `host:port:pin`.
    Pin(String),
    /// Special action auto-off, keyed by action name.
    SpecialAction(String),
}

impl TimerKey {
    /// Creates a group key. Group names are case-insensitive.
    #[must_use]
    pub fn group(name: &str) -> Self {
        Self::Group(normalize(name))
    }

    /// Creates a GPIO pin key.
    #[must_use]
    pub fn pin(key: impl Into<String>) -> Self {
        Self::Pin(key.into())
    }

    /// Creates a special action key.
    #[must_use]
    pub fn special_action(name: impl Into<String>) -> Self {
        Self::SpecialAction(name.into())
    }
}

impl fmt::Display for TimerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group(name) => write!(f, "group:{name}"),
            Self::Pin(key) => write!(f, "pin:{key}"),
            Self::SpecialAction(name) => write!(f, "action:{name}"),
        }
    }
}

#[derive(Debug)]
struct ArmedTimer {
    id: u64,
    deadline: Instant,
    handle: AbortHandle,
}

/// Registry of pending reversals.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Default)]
pub struct TimerRegistry {
    next_id: AtomicU64,
    timers: Mutex<HashMap<TimerKey, ArmedTimer>>,
}

impl TimerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms `on_fire` to run after `delay`, replacing any timer under `key`.
    pub fn arm<F>(self: &Arc<Self>, key: TimerKey, delay: Duration, on_fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let deadline = deadline_after(Instant::now(), delay);
        let registry = Arc::clone(self);
        let fire_key = key.clone();

        // The lock is held across the spawn so the new task cannot observe
        // the map before its own entry is in it.
        let mut timers = self.timers.lock();
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if registry.disarm_fired(&fire_key, id) {
                tracing::debug!(key = %fire_key, "Timer fired");
                on_fire.await;
            }
        })
        .abort_handle();

        if let Some(previous) = timers.insert(
            key.clone(),
            ArmedTimer {
                id,
                deadline,
                handle,
            },
        ) {
            previous.handle.abort();
            tracing::debug!(%key, "Replaced pending timer");
        }
    }

    /// Cancels the timer under `key`. Returns true if one was pending.
    pub fn cancel(&self, key: &TimerKey) -> bool {
        match self.timers.lock().remove(key) {
            Some(timer) => {
                timer.handle.abort();
                tracing::debug!(%key, "Cancelled pending timer");
                true
            }
            None => false,
        }
    }

    /// Cancels every pending timer.
    pub fn cancel_all(&self) {
        for (_, timer) in self.timers.lock().drain() {
            timer.handle.abort();
        }
    }

    /// Returns true if a timer is pending under `key`.
    #[must_use]
    pub fn is_armed(&self, key: &TimerKey) -> bool {
        self.timers.lock().contains_key(key)
    }

    /// Returns the deadline of the timer under `key`.
    #[must_use]
    pub fn deadline(&self, key: &TimerKey) -> Option<Instant> {
        self.timers.lock().get(key).map(|t| t.deadline)
    }

    /// Returns the number of pending timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timers.lock().len()
    }

    /// Returns true if no timer is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn disarm_fired(&self, key: &TimerKey, id: u64) -> bool {
        let mut timers = self.timers.lock();
        match timers.get(key) {
            Some(timer) if timer.id == id => {
                timers.remove(key);
                true
            }
            _ => false,
        }
    }
}

impl Drop for TimerRegistry {
    fn drop(&mut self) {
        for (_, timer) in self.timers.get_mut().drain() {
            timer.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let make = move || {
            let c = Arc::clone(&c);
            Box::pin(async move {
                c.fetch_add(1, Ordering::SeqCst);
            }) as std::pin::Pin<Box<dyn Future<Output = ()> + Send>>
        };
        (count, make)
    }

    #[test]
    fn group_keys_are_case_insensitive() {
        assert_eq!(TimerKey::group("Amp"), TimerKey::group("AMP"));
        assert_ne!(TimerKey::group("amp"), TimerKey::special_action("amp"));
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay_and_disarms() {
        let registry = Arc::new(TimerRegistry::new());
        let (count, make) = counter();
        let key = TimerKey::group("Amp");

        registry.arm(key.clone(), Duration::from_secs(5), make());
        assert!(registry.is_armed(&key));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!registry.is_armed(&key));
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_previous_timer() {
        let registry = Arc::new(TimerRegistry::new());
        let (count, make) = counter();
        let key = TimerKey::pin("127.0.0.1:8888:17");

        registry.arm(key.clone(), Duration::from_secs(5), make());
        tokio::time::sleep(Duration::from_secs(3)).await;
        registry.arm(key.clone(), Duration::from_secs(5), make());
        assert_eq!(registry.len(), 1);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0, "first timer must not fire");

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_delay_is_clamped() {
        let registry = Arc::new(TimerRegistry::new());
        let (count, make) = counter();
        let key = TimerKey::group("Fan");
        let now = Instant::now();

        registry.arm(key.clone(), Duration::from_secs(u64::MAX), make());

        assert_eq!(registry.deadline(&key), Some(now + MAX_DELAY));
        tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(registry.is_armed(&key));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing() {
        let registry = Arc::new(TimerRegistry::new());
        let (count, make) = counter();
        let key = TimerKey::special_action("Doorbell");

        registry.arm(key.clone(), Duration::from_secs(1), make());
        assert!(registry.cancel(&key));
        assert!(!registry.cancel(&key));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_clears_every_key() {
        let registry = Arc::new(TimerRegistry::new());
        let (count, make) = counter();

        registry.arm(TimerKey::group("a"), Duration::from_secs(1), make());
        registry.arm(TimerKey::group("b"), Duration::from_secs(1), make());
        registry.cancel_all();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
