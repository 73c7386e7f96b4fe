// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Time-of-day schedules.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, Timelike};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::backend::Backend;
use crate::types::{ScheduleTime, weekday_abbrev};

use super::Orchestrator;

/// Fires configured schedule entries at most once per wall-clock minute.
///
/// Call [`run_schedules`](Self::run_schedules) as often as you like (the
/// built-in driver polls every 10 seconds); entries for a given minute fire
/// on the first call within that minute and never again for it.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use powerseq::config::AppConfig;
/// use powerseq::engine::{Orchestrator, Scheduler};
/// # use powerseq::{backend::Backend, error::DeviceError, state::GpioOutput, types::PowerAction};
/// # struct Snmp;
/// # impl Backend for Snmp {
/// #     async fn write_outlet(&self, _: &str, _: &str, _: PowerAction) -> Result<(), DeviceError> { Ok(()) }
/// #     async fn write_gpio(&self, _: &GpioOutput, _: PowerAction) -> Result<(), DeviceError> { Ok(()) }
/// # }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let config = AppConfig::from_json_str(
///     r#"{ "schedules": [{ "time": "07:00", "action": "on", "groups": ["Coffee"] }] }"#,
/// ).unwrap();
/// let scheduler = Scheduler::new(Orchestrator::new(Snmp, config));
///
/// let seven = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap().and_hms_opt(7, 0, 10).unwrap();
/// assert_eq!(scheduler.run_schedules_at(seven).len(), 1);
/// assert!(scheduler.run_schedules_at(seven).is_empty());
/// # }
/// ```
#[derive(Debug)]
pub struct Scheduler<B> {
    engine: Orchestrator<B>,
    last_run: Mutex<Option<(NaiveDate, u32, u32)>>,
}

impl<B: Backend> Scheduler<B> {
    /// Creates a scheduler that fires through `engine`.
    #[must_use]
    pub fn new(engine: Orchestrator<B>) -> Self {
        Self {
            engine,
            last_run: Mutex::new(None),
        }
    }

    /// Fires the entries due at the current local time.
    ///
    /// Returns the handles of the spawned group actions; dropping them
    /// leaves the actions running.
    pub fn run_schedules(&self) -> Vec<JoinHandle<()>> {
        self.run_schedules_at(Local::now().naive_local())
    }

    /// Fires the entries due at `now`.
    ///
    /// Each listed group (or every outlet, for entries without groups) is
    /// triggered on its own task, so entries never wait on one another.
    pub fn run_schedules_at(&self, now: NaiveDateTime) -> Vec<JoinHandle<()>> {
        let minute = (now.date(), now.hour(), now.minute());
        {
            let mut last_run = self.last_run.lock();
            if *last_run == Some(minute) {
                return Vec::new();
            }
            *last_run = Some(minute);
        }

        let time = ScheduleTime::of(&now);
        let day = now.weekday();
        let config = self.engine.config();

        let mut fired = Vec::new();
        for entry in config
            .schedules
            .iter()
            .filter(|entry| entry.time == time && entry.runs_on(day))
        {
            tracing::info!(
                time = %entry.time,
                day = weekday_abbrev(day),
                action = %entry.action,
                groups = ?entry.groups,
                "Running scheduled task"
            );
            if entry.groups.is_empty() {
                fired.push(tokio::spawn(self.engine.boxed_trigger(None, entry.action)));
            } else {
                for group in &entry.groups {
                    fired.push(tokio::spawn(
                        self.engine.boxed_trigger(Some(group.clone()), entry.action),
                    ));
                }
            }
        }
        fired
    }

    /// Runs [`run_schedules`](Self::run_schedules) forever at the engine's
    /// schedule poll interval.
    pub fn spawn(self) -> JoinHandle<()> {
        self.drive(|| Local::now().naive_local())
    }

    /// Polls on the schedule interval, reading the wall clock from `now`.
    fn drive<F>(self, mut now: F) -> JoinHandle<()>
    where
        F: FnMut() -> NaiveDateTime + Send + 'static,
    {
        let period = self.engine.settings().schedule_poll;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::debug!(period_ms = period.as_millis(), "Schedule driver started");
            loop {
                ticker.tick().await;
                self.run_schedules_at(now());
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::config::AppConfig;
    use crate::error::DeviceError;
    use crate::state::{GpioOutput, PduInfo, PduOutlet};
    use crate::types::PowerAction;

    struct NoopBackend;

    impl Backend for NoopBackend {
        async fn write_outlet(&self, _: &str, _: &str, _: PowerAction) -> Result<(), DeviceError> {
            Ok(())
        }

        async fn write_gpio(&self, _: &GpioOutput, _: PowerAction) -> Result<(), DeviceError> {
            Ok(())
        }
    }

    fn scheduler() -> Scheduler<NoopBackend> {
        let config = AppConfig::from_json_str(
            r#"{
                "schedules": [
                    { "time": "07:00", "action": "on", "groups": ["Coffee", "Radio"] },
                    { "time": "07:00", "action": "off", "groups": ["Porch"], "days": ["Sat", "Sun"] },
                    { "time": "23:30", "action": "off" }
                ]
            }"#,
        )
        .unwrap();
        Scheduler::new(Orchestrator::new(NoopBackend, config))
    }

    fn at(day: u32, hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        // March 2024: the 4th is a Monday, the 9th a Saturday
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap()
    }

    struct CountingBackend(AtomicUsize);

    impl Backend for CountingBackend {
        async fn write_outlet(&self, _: &str, _: &str, _: PowerAction) -> Result<(), DeviceError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn write_gpio(&self, _: &GpioOutput, _: PowerAction) -> Result<(), DeviceError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn driver_fires_each_minute_once() {
        let config = AppConfig::from_json_str(
            r#"{ "schedules": [{ "time": "07:00", "action": "on", "groups": ["Coffee"] }] }"#,
        )
        .unwrap();
        let engine = Orchestrator::new(CountingBackend(AtomicUsize::new(0)), config);
        engine.update_store(|store| {
            store.upsert_pdu(
                "10.0.0.5",
                PduInfo::new("kitchen", "RPDU").with_outlet(PduOutlet::new("1", "Coffee Maker")),
            );
        });

        let base = at(4, 6, 59, 45);
        let started = tokio::time::Instant::now();
        let clock = move || {
            let elapsed = chrono::Duration::from_std(started.elapsed()).unwrap();
            base + elapsed
        };
        let driver = Scheduler::new(engine.clone()).drive(clock);

        // Polls every 10s: six of them fall within 07:00
        tokio::time::sleep(Duration::from_secs(90)).await;
        driver.abort();

        assert_eq!(engine.backend().0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fires_once_per_minute() {
        let scheduler = scheduler();

        assert_eq!(scheduler.run_schedules_at(at(4, 7, 0, 0)).len(), 2);
        assert!(scheduler.run_schedules_at(at(4, 7, 0, 10)).is_empty());
        assert!(scheduler.run_schedules_at(at(4, 7, 0, 50)).is_empty());
    }

    #[tokio::test]
    async fn same_minute_on_another_day_fires_again() {
        let scheduler = scheduler();

        assert_eq!(scheduler.run_schedules_at(at(4, 7, 0, 0)).len(), 2);
        assert_eq!(scheduler.run_schedules_at(at(5, 7, 0, 0)).len(), 2);
    }

    #[tokio::test]
    async fn day_filter_applies() {
        let scheduler = scheduler();

        assert_eq!(scheduler.run_schedules_at(at(9, 7, 0, 0)).len(), 3);
    }

    #[tokio::test]
    async fn entry_without_groups_fires_global_action() {
        let scheduler = scheduler();

        assert_eq!(scheduler.run_schedules_at(at(4, 23, 30, 0)).len(), 1);
        assert!(scheduler.run_schedules_at(at(4, 23, 31, 0)).is_empty());
    }
}
