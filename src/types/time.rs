// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wall-clock types used by schedules.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// A time of day with minute precision, written `HH:MM` in configuration.
///
/// # Examples
///
/// ```
/// use powerseq::types::ScheduleTime;
///
/// let time: ScheduleTime = "07:30".parse().unwrap();
/// assert_eq!(time.hour(), 7);
/// assert_eq!(time.minute(), 30);
/// assert_eq!(time.to_string(), "07:30");
///
/// assert!("24:00".parse::<ScheduleTime>().is_err());
/// assert!("7.30".parse::<ScheduleTime>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScheduleTime {
    hour: u8,
    minute: u8,
}

impl ScheduleTime {
    /// Creates a schedule time.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if `hour > 23` or `minute > 59`.
    pub fn new(hour: u8, minute: u8) -> Result<Self, ValueError> {
        if hour > 23 {
            return Err(ValueError::OutOfRange {
                min: 0,
                max: 23,
                actual: u32::from(hour),
            });
        }
        if minute > 59 {
            return Err(ValueError::OutOfRange {
                min: 0,
                max: 59,
                actual: u32::from(minute),
            });
        }
        Ok(Self { hour, minute })
    }

    /// Returns the schedule time matching the hour and minute of `now`.
    #[must_use]
    pub fn of(now: &NaiveDateTime) -> Self {
        // hour() < 24 and minute() < 60
        #[allow(clippy::cast_possible_truncation)]
        Self {
            hour: now.hour() as u8,
            minute: now.minute() as u8,
        }
    }

    /// Returns the hour (0-23).
    #[must_use]
    pub const fn hour(&self) -> u8 {
        self.hour
    }

    /// Returns the minute (0-59).
    #[must_use]
    pub const fn minute(&self) -> u8 {
        self.minute
    }
}

impl fmt::Display for ScheduleTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for ScheduleTime {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValueError::InvalidTime(s.to_string());

        let (hour, minute) = s.trim().split_once(':').ok_or_else(invalid)?;
        let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return Err(invalid());
        }
        if !digits(hour) || !digits(minute) {
            return Err(invalid());
        }
        let hour: u8 = hour.parse().map_err(|_| invalid())?;
        let minute: u8 = minute.parse().map_err(|_| invalid())?;

        Self::new(hour, minute)
    }
}

impl TryFrom<String> for ScheduleTime {
    type Error = ValueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScheduleTime> for String {
    fn from(time: ScheduleTime) -> Self {
        time.to_string()
    }
}

/// Returns the English three-letter abbreviation used in schedule day lists.
///
/// # Examples
///
/// ```
/// use chrono::Weekday;
/// use powerseq::types::weekday_abbrev;
///
/// assert_eq!(weekday_abbrev(Weekday::Sun), "Sun");
/// assert_eq!(weekday_abbrev(Weekday::Thu), "Thu");
/// ```
#[must_use]
pub const fn weekday_abbrev(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn parses_padded_and_unpadded_hours() {
        assert_eq!("07:05".parse::<ScheduleTime>().unwrap(), ScheduleTime::new(7, 5).unwrap());
        assert_eq!("7:05".parse::<ScheduleTime>().unwrap(), ScheduleTime::new(7, 5).unwrap());
        assert_eq!("23:59".parse::<ScheduleTime>().unwrap().to_string(), "23:59");
    }

    #[test]
    fn rejects_malformed_times() {
        for input in [
            "", "12", "12:5", "12:060", "aa:bb", "-1:00", "12:60", "123:00", "+7:00", "7:+5",
        ] {
            assert!(input.parse::<ScheduleTime>().is_err(), "{input} should fail");
        }
    }

    #[test]
    fn of_truncates_seconds() {
        let now = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(18, 42, 57)
            .unwrap();
        assert_eq!(ScheduleTime::of(&now).to_string(), "18:42");
    }

    #[test]
    fn serde_uses_hh_mm_strings() {
        let time: ScheduleTime = serde_json::from_str("\"06:00\"").unwrap();
        assert_eq!(time, ScheduleTime::new(6, 0).unwrap());
        assert_eq!(serde_json::to_string(&time).unwrap(), "\"06:00\"");
        assert!(serde_json::from_str::<ScheduleTime>("\"6am\"").is_err());
    }
}
