//! Batch windows for diff artifacts.
//!
//! Diffs are grouped by processing time. Older history is sparse, so early
//! windows are wide: quarters before 2016, months until mid-2017, then days.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Width of the batch window a processing time falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowGranularity {
    Quarter,
    Month,
    Day,
}

/// First instant covered by monthly windows.
fn month_era_start() -> NaiveDateTime {
    ymd(2016, 1, 1)
}

/// First instant covered by daily windows.
fn day_era_start() -> NaiveDateTime {
    ymd(2017, 7, 1)
}

fn ymd(year: i32, month: u32, day: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

impl WindowGranularity {
    pub fn for_time(time: NaiveDateTime) -> Self {
        if time < month_era_start() {
            WindowGranularity::Quarter
        } else if time < day_era_start() {
            WindowGranularity::Month
        } else {
            WindowGranularity::Day
        }
    }

    /// First day of the window containing `date`.
    pub fn window_start(self, date: NaiveDate) -> NaiveDate {
        let (year, month, day) = match self {
            WindowGranularity::Quarter => (date.year(), (date.month() - 1) / 3 * 3 + 1, 1),
            WindowGranularity::Month => (date.year(), date.month(), 1),
            WindowGranularity::Day => return date,
        };
        NaiveDate::from_ymd_opt(year, month, day).unwrap_or(date)
    }
}

/// Window key (`YYYY-MM-DD`) of the window containing `time`.
pub fn window_key(time: NaiveDateTime) -> String {
    WindowGranularity::for_time(time)
        .window_start(time.date())
        .format("%Y-%m-%d")
        .to_string()
}
