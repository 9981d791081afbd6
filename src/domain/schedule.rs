//! Investment schedule generation.
//!
//! Monthly and quarterly schedules use calendar-month arithmetic: every event
//! is computed as `anchor + k months` from a fixed anchor, never by stepping
//! from the previous event, so short months cannot drift the schedule.

use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::error::NavsimError;

/// Closed date range of a backtest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    /// Every weekday (Monday to Friday).
    Daily,
    Weekly,
    Monthly,
    Quarterly,
}

impl Frequency {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "quarterly" => Some(Self::Quarterly),
            _ => None,
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
        };
        f.write_str(s)
    }
}

/// Generate the ordered investment dates for `range`.
///
/// `day_of_month` only applies to [`Frequency::Monthly`]. A range whose start
/// equals its end always yields exactly that one date.
pub fn generate(
    range: DateRange,
    frequency: Frequency,
    day_of_month: Option<u32>,
) -> Result<Vec<NaiveDate>, NavsimError> {
    if range.start > range.end {
        return Err(NavsimError::InvalidRange {
            start: range.start,
            end: range.end,
        });
    }
    if range.start == range.end {
        return Ok(vec![range.start]);
    }

    let dates = match frequency {
        Frequency::Daily => business_days(range),
        Frequency::Weekly => fixed_step(range, Duration::days(7)),
        Frequency::Monthly => {
            let anchor = match day_of_month {
                Some(day) => monthly_anchor(range.start, day)?,
                None => range.start,
            };
            month_steps(anchor, range.end, 1)
        }
        Frequency::Quarterly => month_steps(range.start, range.end, 3),
    };
    Ok(dates)
}

fn business_days(range: DateRange) -> Vec<NaiveDate> {
    range
        .start
        .iter_days()
        .take_while(|d| *d <= range.end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}

fn fixed_step(range: DateRange, step: Duration) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = range.start;
    while current <= range.end {
        dates.push(current);
        current += step;
    }
    dates
}

/// First date on or after `start` whose day of month is `day`.
fn monthly_anchor(start: NaiveDate, day: u32) -> Result<NaiveDate, NavsimError> {
    if !(1..=28).contains(&day) {
        return Err(NavsimError::InvalidPolicy {
            reason: format!("day_of_month must be between 1 and 28, got {day}"),
        });
    }
    let in_start_month = start.with_day(day).ok_or_else(|| NavsimError::InvalidPolicy {
        reason: format!("day_of_month {day} is not valid for {start}"),
    })?;
    if in_start_month >= start {
        return Ok(in_start_month);
    }
    in_start_month
        .checked_add_months(Months::new(1))
        .ok_or_else(|| NavsimError::InvalidPolicy {
            reason: format!("schedule anchor overflows after {start}"),
        })
}

fn month_steps(anchor: NaiveDate, end: NaiveDate, months_per_step: u32) -> Vec<NaiveDate> {
    (0u32..)
        .map_while(|k| anchor.checked_add_months(Months::new(k * months_per_step)))
        .take_while(|d| *d <= end)
        .collect()
}
